//! Header utilities for upstream requests
//!
//! Upstream requests carry a fixed, minimal header set built from the provider
//! descriptor alone. Caller headers are never copied, so the proxy credential
//! cannot leak to a provider.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{AppError, AppResult};
use crate::registry::{AuthMode, ProviderDescriptor};

/// Anthropic API version sent with every Messages request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

fn secret_value(target: &ProviderDescriptor, value: String) -> AppResult<HeaderValue> {
    let mut value = HeaderValue::from_str(&value).map_err(|_| {
        AppError::Internal(anyhow::anyhow!(
            "API key for route '{}' contains characters not allowed in a header",
            target.alias
        ))
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Build the headers for a request to `target`
pub fn build_upstream_headers(target: &ProviderDescriptor, stream: bool) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(if stream { "text/event-stream" } else { "application/json" }),
    );

    let key = target.api_key.clone().unwrap_or_default();
    match target.auth_mode {
        AuthMode::Bearer if !key.is_empty() => {
            headers.insert(AUTHORIZATION, secret_value(target, format!("Bearer {}", key))?);
        }
        AuthMode::XApiKey if !key.is_empty() => {
            headers.insert("x-api-key", secret_value(target, key)?);
        }
        AuthMode::GoogApiKey if !key.is_empty() => {
            headers.insert("x-goog-api-key", secret_value(target, key)?);
        }
        _ => {}
    }

    if target.auth_mode == AuthMode::XApiKey {
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
    }

    Ok(headers)
}
