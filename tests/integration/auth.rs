//! Proxy credential integration tests
//!
//! A rejected caller must never reach the registry or an upstream.

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use serde_json::{json, Value};

use crate::common::{
    build_server, constants::*, post_responses_as, route, test_config, CountingDispatcher,
};
use worker_proxy::registry::Dialect;

fn counting_server() -> (axum_test::TestServer, Arc<CountingDispatcher>) {
    let dispatcher = Arc::new(CountingDispatcher::default());
    let config = test_config(vec![route(
        FAST_ALIAS,
        Dialect::OpenAiChat,
        FAST_MODEL,
        "http://127.0.0.1:1/v1",
    )]);
    (build_server(config, dispatcher.clone()), dispatcher)
}

fn hello() -> Value {
    json!({"model": FAST_ALIAS, "input": "Hello"})
}

#[tokio::test]
async fn test_invalid_credential_rejected_without_upstream_call() {
    let (server, dispatcher) = counting_server();

    let response = post_responses_as(&server, WRONG_PROXY_TOKEN, hello()).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "invalid_api_key");
    assert_eq!(dispatcher.calls(), 0);
}

#[tokio::test]
async fn test_missing_credential_rejected() {
    let (server, dispatcher) = counting_server();

    let response = server.post("/v1/responses").json(&hello()).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(dispatcher.calls(), 0);
}

#[tokio::test]
async fn test_non_bearer_scheme_rejected() {
    let (server, dispatcher) = counting_server();

    let response = server
        .post("/v1/responses")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", TEST_PROXY_TOKEN)).unwrap(),
        )
        .json(&hello())
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(dispatcher.calls(), 0);
}

#[tokio::test]
async fn test_unknown_model_rejected_without_upstream_call() {
    let (server, dispatcher) = counting_server();

    let response = post_responses_as(
        &server,
        TEST_PROXY_TOKEN,
        json!({"model": "gpt-9", "input": "Hello"}),
    )
    .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "model_not_found");
    assert_eq!(dispatcher.calls(), 0);
}

#[tokio::test]
async fn test_valid_credential_reaches_dispatcher_once() {
    let (server, dispatcher) = counting_server();

    let response = post_responses_as(&server, TEST_PROXY_TOKEN, hello()).await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["output_text"], "answered by fast");
    assert_eq!(dispatcher.calls(), 1);
}
