//! Models endpoint
//!
//! Lists the aliases callers may use in `model`.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::{error::AppResult, registry::ProviderDescriptor, AppState};

/// Model information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub object: String,
    pub owned_by: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Upstream dialect serving this alias
    pub provider: String,
}

impl From<&ProviderDescriptor> for Model {
    fn from(d: &ProviderDescriptor) -> Self {
        Self {
            id: d.alias.clone(),
            object: "model".to_string(),
            owned_by: "worker-proxy".to_string(),
            display_name: d.display_name.clone().unwrap_or_else(|| d.alias.clone()),
            description: d.description.clone(),
            context_length: d.context_length,
            max_output_tokens: d.max_output_tokens,
            provider: d.dialect.as_str().to_string(),
        }
    }
}

/// Models list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<Model>,
}

/// List configured aliases, in configuration order
pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> AppResult<(StatusCode, Json<ModelsResponse>)> {
    let response = ModelsResponse {
        object: "list".to_string(),
        data: state.registry.list().iter().map(Model::from).collect(),
    };

    Ok((StatusCode::OK, Json(response)))
}
