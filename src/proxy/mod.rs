//! Proxy module
//!
//! Handles request forwarding to upstream AI providers.

pub mod headers;
pub mod http;
pub mod logging;
pub mod provider;
pub mod retry;

pub use http::HttpDispatcher;
pub use provider::{ByteStream, UpstreamDispatcher};
