//! Upstream dispatcher abstraction
//!
//! Defines the seam between the gateway and the network so the gateway can be
//! driven by counting mocks in tests.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde_json::Value;

use crate::error::AppResult;
use crate::native::translate::UpstreamRequest;
use crate::registry::ProviderDescriptor;

/// Raw upstream body chunks, delivered as they arrive
pub type ByteStream = Pin<Box<dyn Stream<Item = AppResult<Bytes>> + Send>>;

/// Sends translated requests to an upstream provider
///
/// # Security
///
/// Implementations MUST:
/// - Never forward the caller's proxy credential upstream
/// - Authenticate with the descriptor's own key, per its `AuthMode`
#[async_trait]
pub trait UpstreamDispatcher: Send + Sync {
    /// Send a request and return the complete JSON response body
    async fn send(&self, target: &ProviderDescriptor, request: &UpstreamRequest) -> AppResult<Value>;

    /// Send a request and return the response body as a live byte stream
    ///
    /// Returns once the upstream has answered with a success status; non-2xx
    /// statuses fail here, before any byte is streamed.
    async fn send_stream(
        &self,
        target: &ProviderDescriptor,
        request: &UpstreamRequest,
    ) -> AppResult<ByteStream>;
}
