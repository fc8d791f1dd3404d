//! Models endpoint integration tests

use axum::http::{header, StatusCode};
use serde_json::Value;

use crate::common::{bearer, constants::*, TestHarness};

#[tokio::test]
async fn test_models_lists_aliases_in_config_order() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .get("/v1/models")
        .add_header(header::AUTHORIZATION, bearer(TEST_PROXY_TOKEN))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["object"], "list");

    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![FAST_ALIAS, DEEP_THINK_ALIAS, GEMINI_ALIAS, EDGE_ALIAS]);
}

#[tokio::test]
async fn test_models_expose_provider_and_metadata() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .get("/models")
        .add_header(header::AUTHORIZATION, bearer(TEST_PROXY_TOKEN))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    let edge = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["id"] == EDGE_ALIAS)
        .unwrap();

    assert_eq!(edge["provider"], "cloudflare-ai");
    assert_eq!(edge["object"], "model");
    assert_eq!(edge["description"], "Workers AI at the edge");
    // Native model ids and keys stay private
    assert!(!response.text().contains(EDGE_MODEL));
    assert!(!response.text().contains("test-key"));
}

#[tokio::test]
async fn test_models_requires_credential() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/v1/models").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}
