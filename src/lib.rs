//! Worker Proxy - one Responses API in front of many AI providers
//!
//! Callers authenticate with a single proxy credential and pick a model alias;
//! the proxy resolves the alias to a provider, translates the request into that
//! provider's dialect, and normalizes the answer (or stream) back.

pub mod config;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod native;
pub mod proxy;
pub mod registry;
pub mod routes;
pub mod streaming;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

pub use crate::config::Config;
pub use crate::gateway::{Gateway, GatewayReply};
pub use crate::middleware::auth::CredentialGate;
pub use crate::proxy::{HttpDispatcher, UpstreamDispatcher};
pub use crate::registry::ModelRegistry;

/// Application state shared across all request handlers
///
/// Read-only after startup; no locks are taken across calls.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<ModelRegistry>,
    pub gate: CredentialGate,
    pub gateway: Gateway,
    pub start_time: Instant,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config) -> Result<Self> {
        let dispatcher = HttpDispatcher::new(config.connect_timeout)
            .context("Failed to create upstream HTTP client")?;
        Self::with_dispatcher(config, Arc::new(dispatcher))
    }

    /// Create a new application state for testing with a substitute dispatcher
    ///
    /// Tests pass counting mocks here to observe exactly which calls reach an
    /// upstream. Provider keys are not required.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(config: Config, dispatcher: Arc<dyn UpstreamDispatcher>) -> Result<Self> {
        let registry = ModelRegistry::from_routes_with(&config.routes, |_| Some("test-key".to_string()))
            .context("Invalid routes configuration")?;
        Ok(Self::assemble(config, registry, dispatcher))
    }

    fn with_dispatcher(config: Config, dispatcher: Arc<dyn UpstreamDispatcher>) -> Result<Self> {
        let registry =
            ModelRegistry::from_routes(&config.routes).context("Invalid routes configuration")?;
        Ok(Self::assemble(config, registry, dispatcher))
    }

    fn assemble(config: Config, registry: ModelRegistry, dispatcher: Arc<dyn UpstreamDispatcher>) -> Self {
        let registry = Arc::new(registry);
        let gateway = Gateway::new(
            registry.clone(),
            dispatcher,
            config.request_timeout,
            config.stream_idle_timeout,
        );

        Self {
            gate: CredentialGate::new(&config.proxy_auth_token),
            config,
            registry,
            gateway,
            start_time: Instant::now(),
        }
    }
}
