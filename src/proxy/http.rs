//! HTTP dispatcher
//!
//! Sends translated requests to providers over a shared, pooled `reqwest` client.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, error, instrument};

use super::headers::build_upstream_headers;
use super::logging::UpstreamContext;
use super::provider::{ByteStream, UpstreamDispatcher};
use super::retry::retry_once;
use crate::error::{AppError, AppResult};
use crate::native::translate::UpstreamRequest;
use crate::registry::ProviderDescriptor;
use crate::routes::metrics::record_upstream_request;

/// Production dispatcher
///
/// Holds no per-call state. Deadlines are enforced by the gateway, so the client
/// carries only a connect timeout.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    pub fn new(connect_timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Send one attempt and check the status
    async fn post(
        &self,
        target: &ProviderDescriptor,
        request: &UpstreamRequest,
        ctx: &UpstreamContext,
    ) -> AppResult<reqwest::Response> {
        let url = target.url_for(&request.path);
        let headers = build_upstream_headers(target, request.stream)?;
        ctx.log_upstream_request(&url, headers.len());

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| {
                ctx.log_connection_error(&e.to_string());
                map_send_error(target, e)
            })?;

        let status = response.status();
        ctx.log_upstream_response(status.as_u16());
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamError {
                provider: target.provider_name().to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send_once(
        &self,
        target: &ProviderDescriptor,
        request: &UpstreamRequest,
        ctx: &UpstreamContext,
    ) -> AppResult<Value> {
        let response = self.post(target, request, ctx).await?;
        let bytes = response.bytes().await.map_err(|e| map_send_error(target, e))?;
        serde_json::from_slice(&bytes).map_err(|e| AppError::MalformedUpstreamResponse {
            provider: target.provider_name().to_string(),
            message: format!("response body is not JSON: {}", e),
        })
    }
}

/// Classify a transport failure
fn map_send_error(target: &ProviderDescriptor, err: reqwest::Error) -> AppError {
    let provider = target.provider_name().to_string();
    if err.is_timeout() {
        AppError::UpstreamTimeout { provider }
    } else if err.is_decode() {
        AppError::MalformedUpstreamResponse {
            provider,
            message: err.to_string(),
        }
    } else {
        // connect, DNS, reset, broken body
        AppError::UpstreamUnreachable {
            provider,
            message: err.to_string(),
        }
    }
}

fn outcome(result: &AppResult<impl Sized>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    }
}

#[async_trait]
impl UpstreamDispatcher for HttpDispatcher {
    #[instrument(skip_all, fields(alias = %target.alias, dialect = %target.dialect))]
    async fn send(&self, target: &ProviderDescriptor, request: &UpstreamRequest) -> AppResult<Value> {
        let ctx = UpstreamContext::new(target, false);
        let result = retry_once(&target.alias, || self.send_once(target, request, &ctx)).await;

        record_upstream_request(&target.alias, target.dialect.as_str(), outcome(&result));
        match &result {
            Ok(_) => ctx.log_complete(),
            Err(e) => ctx.log_error(&e.to_string()),
        }
        result
    }

    #[instrument(skip_all, fields(alias = %target.alias, dialect = %target.dialect))]
    async fn send_stream(
        &self,
        target: &ProviderDescriptor,
        request: &UpstreamRequest,
    ) -> AppResult<ByteStream> {
        let ctx = UpstreamContext::new(target, true);
        let result = self.post(target, request, &ctx).await;
        record_upstream_request(&target.alias, target.dialect.as_str(), outcome(&result));

        let response = result.map_err(|e| {
            ctx.log_error(&e.to_string());
            e
        })?;
        debug!(trace_id = %ctx.trace_id, "Upstream stream opened");

        let provider = target.provider_name();
        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| {
                error!(provider = %provider, error = %e, "Upstream stream broke");
                AppError::UpstreamUnreachable {
                    provider: provider.to_string(),
                    message: e.to_string(),
                }
            })
        });
        Ok(Box::pin(stream))
    }
}
