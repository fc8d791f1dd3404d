//! Upstream request logging
//!
//! Structured logging with a short correlation id for every request the proxy
//! sends upstream. Keys never appear in these logs.

use std::time::Instant;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::registry::ProviderDescriptor;

/// Context for tracking one upstream request
#[derive(Debug, Clone)]
pub struct UpstreamContext {
    /// Short id for log correlation
    pub trace_id: String,
    pub start_time: Instant,
    pub alias: String,
    pub provider: &'static str,
    pub model: String,
    pub streaming: bool,
}

impl UpstreamContext {
    pub fn new(target: &ProviderDescriptor, streaming: bool) -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            start_time: Instant::now(),
            alias: target.alias.clone(),
            provider: target.provider_name(),
            model: target.native_model_id.clone(),
            streaming,
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    pub fn log_upstream_request(&self, url: &str, header_count: usize) {
        debug!(
            trace_id = %self.trace_id,
            alias = %self.alias,
            provider = %self.provider,
            model = %self.model,
            url = %url,
            header_count = %header_count,
            streaming = %self.streaming,
            "Sending request to upstream"
        );
    }

    pub fn log_upstream_response(&self, status: u16) {
        info!(
            trace_id = %self.trace_id,
            alias = %self.alias,
            provider = %self.provider,
            status = %status,
            elapsed_ms = %self.elapsed_ms(),
            "Response received from upstream"
        );
    }

    pub fn log_complete(&self) {
        debug!(
            trace_id = %self.trace_id,
            alias = %self.alias,
            elapsed_ms = %self.elapsed_ms(),
            "Upstream request completed"
        );
    }

    /// Connectivity failures get their own line for debugging DNS/TLS issues
    pub fn log_connection_error(&self, error: &str) {
        error!(
            trace_id = %self.trace_id,
            alias = %self.alias,
            provider = %self.provider,
            elapsed_ms = %self.elapsed_ms(),
            error = %error,
            "Connection to upstream failed"
        );
    }

    pub fn log_error(&self, error: &str) {
        error!(
            trace_id = %self.trace_id,
            alias = %self.alias,
            provider = %self.provider,
            model = %self.model,
            streaming = %self.streaming,
            elapsed_ms = %self.elapsed_ms(),
            error = %error,
            "Upstream request failed"
        );
    }
}
