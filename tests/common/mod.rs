//! Common test utilities for the worker proxy
//!
//! Builds the full router against mock upstreams so integration tests exercise
//! the same path a deployed proxy takes: auth, registry, translation, dispatch
//! and normalization.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderValue};
use axum_test::{TestResponse, TestServer};
use serde_json::Value;

use worker_proxy::{
    error::{AppError, AppResult},
    native::UpstreamRequest,
    proxy::ByteStream,
    registry::{Dialect, ProviderDescriptor, RouteConfig},
    routes, AppState, Config, HttpDispatcher, UpstreamDispatcher,
};

use crate::mocks::{MockAnthropic, MockGoogle, MockOpenAIChat};

/// Test configuration constants
pub mod constants {
    /// Proxy credential accepted by the test harness
    pub const TEST_PROXY_TOKEN: &str = "test-proxy-token";
    /// Credential the harness rejects
    pub const WRONG_PROXY_TOKEN: &str = "not-the-proxy-token";

    pub const FAST_ALIAS: &str = "fast";
    pub const FAST_MODEL: &str = "llama-3.1-8b";
    pub const DEEP_THINK_ALIAS: &str = "deep-think";
    pub const DEEP_THINK_MODEL: &str = "claude-sonnet-4";
    pub const GEMINI_ALIAS: &str = "gemini-flash";
    pub const GEMINI_MODEL: &str = "gemini-2.5-flash";
    pub const EDGE_ALIAS: &str = "edge";
    pub const EDGE_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";
}

pub fn route(alias: &str, provider: Dialect, model: &str, base_url: &str) -> RouteConfig {
    RouteConfig {
        alias: alias.to_string(),
        provider,
        model: model.to_string(),
        base_url: Some(base_url.to_string()),
        api_key_env: None,
        auth: None,
        description: None,
        display_name: None,
        context_length: None,
        max_output_tokens: None,
    }
}

pub fn test_config(routes: Vec<RouteConfig>) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        proxy_auth_token: constants::TEST_PROXY_TOKEN.to_string(),
        routes,
        request_timeout: Duration::from_secs(2),
        stream_idle_timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_secs(1),
    }
}

pub fn build_server(config: Config, dispatcher: Arc<dyn UpstreamDispatcher>) -> TestServer {
    let state = AppState::new_for_testing(config, dispatcher).expect("Failed to create test state");
    let app = routes::create_router(Arc::new(state));
    TestServer::new(app).expect("Failed to create test server")
}

/// Full proxy wired to one mock server per dialect
pub struct TestHarness {
    pub server: TestServer,
    pub chat: MockOpenAIChat,
    pub anthropic: MockAnthropic,
    pub google: MockGoogle,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(|c| c).await
    }

    /// Build the harness after letting the test adjust the config
    pub async fn with_config<F>(adjust: F) -> Self
    where
        F: FnOnce(Config) -> Config,
    {
        use constants::*;

        let chat = MockOpenAIChat::start().await;
        let anthropic = MockAnthropic::start().await;
        let google = MockGoogle::start().await;

        let mut edge = route(EDGE_ALIAS, Dialect::CloudflareAi, EDGE_MODEL, &chat.base_url());
        edge.description = Some("Workers AI at the edge".to_string());

        let config = adjust(test_config(vec![
            route(FAST_ALIAS, Dialect::OpenAiChat, FAST_MODEL, &chat.base_url()),
            route(DEEP_THINK_ALIAS, Dialect::Anthropic, DEEP_THINK_MODEL, &anthropic.base_url()),
            route(GEMINI_ALIAS, Dialect::Google, GEMINI_MODEL, &google.base_url()),
            edge,
        ]));

        let dispatcher =
            HttpDispatcher::new(config.connect_timeout).expect("Failed to create dispatcher");
        let server = build_server(config, Arc::new(dispatcher));

        Self {
            server,
            chat,
            anthropic,
            google,
        }
    }

    /// POST /v1/responses with the valid proxy credential
    pub async fn post_responses(&self, body: Value) -> TestResponse {
        post_responses_as(&self.server, constants::TEST_PROXY_TOKEN, body).await
    }
}

pub async fn post_responses_as(server: &TestServer, token: &str, body: Value) -> TestResponse {
    server
        .post("/v1/responses")
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&body)
        .await
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header value")
}

/// Split an SSE body into parsed `data:` payloads
pub fn parse_sse_events(body: &str) -> Vec<Value> {
    body.split("\n\n")
        .filter_map(|frame| frame.trim().strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("event is JSON"))
        .collect()
}

/// Dispatcher that only counts calls
///
/// Used where a test must prove no upstream was contacted.
#[derive(Default)]
pub struct CountingDispatcher {
    calls: AtomicUsize,
}

impl CountingDispatcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamDispatcher for CountingDispatcher {
    async fn send(&self, target: &ProviderDescriptor, _request: &UpstreamRequest) -> AppResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(crate::mocks::chat_completion(&format!("answered by {}", target.alias)))
    }

    async fn send_stream(
        &self,
        target: &ProviderDescriptor,
        _request: &UpstreamRequest,
    ) -> AppResult<ByteStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::UpstreamUnreachable {
            provider: target.provider_name().to_string(),
            message: "streaming not scripted".to_string(),
        })
    }
}
