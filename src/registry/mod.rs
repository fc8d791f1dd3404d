//! Model registry
//!
//! Maps caller-facing model aliases to concrete upstream providers. The table is
//! built once at startup from the routes configuration and is read-only afterwards.

mod dialect;

pub use dialect::{AuthMode, Dialect};

use std::collections::HashSet;
use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// One entry of the routes configuration (`ROUTES_CONFIG`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Caller-facing model alias
    pub alias: String,
    /// Wire dialect spoken by the upstream
    pub provider: Dialect,
    /// Model identifier understood by the upstream
    pub model: String,
    /// Overrides the dialect's default endpoint base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the provider API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Overrides the dialect's default auth scheme
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// Errors raised while building or querying the registry
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Unknown model alias: {0}")]
    NotFound(String),

    #[error("Duplicate model alias in routes configuration: {0}")]
    DuplicateAlias(String),

    #[error("Route entry has an empty alias")]
    EmptyAlias,

    #[error("Route '{0}' has an empty model identifier")]
    EmptyModel(String),

    #[error("Route '{alias}' has an invalid base_url: {reason}")]
    InvalidBaseUrl { alias: String, reason: String },

    #[error("Route '{alias}' needs a base_url: provider '{dialect}' has no default endpoint")]
    MissingBaseUrl { alias: String, dialect: Dialect },

    #[error("Route '{alias}' expects the API key in {var}, which is not set")]
    MissingApiKey { alias: String, var: String },
}

/// A fully resolved upstream target
#[derive(Clone)]
pub struct ProviderDescriptor {
    pub alias: String,
    pub dialect: Dialect,
    pub native_model_id: String,
    pub endpoint_base: Url,
    pub auth_mode: AuthMode,
    pub api_key: Option<String>,
    pub description: Option<String>,
    pub display_name: Option<String>,
    pub context_length: Option<u32>,
    pub max_output_tokens: Option<u32>,
}

impl ProviderDescriptor {
    /// Absolute URL for a dialect path such as `/chat/completions`
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint_base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Name used for `provider` fields in errors, logs and metrics
    pub fn provider_name(&self) -> &'static str {
        self.dialect.as_str()
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("alias", &self.alias)
            .field("dialect", &self.dialect)
            .field("native_model_id", &self.native_model_id)
            .field("endpoint_base", &self.endpoint_base.as_str())
            .field("auth_mode", &self.auth_mode)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Alias -> provider lookup table
#[derive(Debug, Default)]
pub struct ModelRegistry {
    descriptors: Vec<ProviderDescriptor>,
}

impl ModelRegistry {
    /// Build the registry, reading API keys from the process environment
    pub fn from_routes(routes: &[RouteConfig]) -> Result<Self, RegistryError> {
        Self::from_routes_with(routes, |var| std::env::var(var).ok())
    }

    /// Build the registry with an explicit key lookup
    pub fn from_routes_with<F>(routes: &[RouteConfig], lookup: F) -> Result<Self, RegistryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut seen = HashSet::new();
        let mut descriptors = Vec::with_capacity(routes.len());

        for route in routes {
            if route.alias.is_empty() {
                return Err(RegistryError::EmptyAlias);
            }
            if !seen.insert(route.alias.as_str()) {
                return Err(RegistryError::DuplicateAlias(route.alias.clone()));
            }
            descriptors.push(build_descriptor(route, &lookup)?);
        }

        info!(routes = descriptors.len(), "Model registry built");
        Ok(Self { descriptors })
    }

    /// Exact, case-sensitive alias lookup
    pub fn resolve(&self, alias: &str) -> Result<&ProviderDescriptor, RegistryError> {
        self.descriptors
            .iter()
            .find(|d| d.alias == alias)
            .ok_or_else(|| RegistryError::NotFound(alias.to_string()))
    }

    /// All descriptors in configuration order
    pub fn list(&self) -> &[ProviderDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn build_descriptor<F>(route: &RouteConfig, lookup: &F) -> Result<ProviderDescriptor, RegistryError>
where
    F: Fn(&str) -> Option<String>,
{
    if route.model.trim().is_empty() {
        return Err(RegistryError::EmptyModel(route.alias.clone()));
    }

    let base = match (&route.base_url, route.provider.default_base_url()) {
        (Some(url), _) => url.as_str(),
        (None, Some(default)) => default,
        (None, None) => {
            return Err(RegistryError::MissingBaseUrl {
                alias: route.alias.clone(),
                dialect: route.provider,
            })
        }
    };

    let endpoint_base = Url::parse(base).map_err(|e| RegistryError::InvalidBaseUrl {
        alias: route.alias.clone(),
        reason: e.to_string(),
    })?;
    if !matches!(endpoint_base.scheme(), "http" | "https") {
        return Err(RegistryError::InvalidBaseUrl {
            alias: route.alias.clone(),
            reason: format!("unsupported scheme '{}'", endpoint_base.scheme()),
        });
    }

    let api_key = match &route.api_key_env {
        Some(var) => Some(lookup(var).filter(|k| !k.is_empty()).ok_or_else(|| {
            RegistryError::MissingApiKey {
                alias: route.alias.clone(),
                var: var.clone(),
            }
        })?),
        None => None,
    };

    Ok(ProviderDescriptor {
        alias: route.alias.clone(),
        dialect: route.provider,
        native_model_id: route.model.clone(),
        endpoint_base,
        auth_mode: route.auth.unwrap_or_else(|| route.provider.default_auth()),
        api_key,
        description: route.description.clone(),
        display_name: route.display_name.clone(),
        context_length: route.context_length,
        max_output_tokens: route.max_output_tokens,
    })
}
