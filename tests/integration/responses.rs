//! Non-streaming Responses API integration tests
//!
//! One alias per dialect; each test checks both the normalized answer and the
//! native request the upstream actually received.

use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{constants::*, TestHarness};

fn weather_tool() -> Value {
    json!({
        "type": "function",
        "name": "get_weather",
        "description": "Current weather for a city",
        "parameters": {
            "type": "object",
            "properties": {"location": {"type": "string"}},
            "required": ["location"]
        }
    })
}

// ============================================================================
// Chat Completions dialect
// ============================================================================

#[tokio::test]
async fn test_fast_alias_answers_through_chat_upstream() {
    let harness = TestHarness::new().await;
    harness.chat.mock_text_completion("Paris").await;

    let response = harness
        .post_responses(json!({
            "model": FAST_ALIAS,
            "input": "What is the capital of France?"
        }))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["object"], "response");
    assert_eq!(json["status"], "completed");
    assert_eq!(json["model"], FAST_ALIAS);
    assert_eq!(json["output_text"], "Paris");
    assert_eq!(json["usage"], json!({"input_tokens": 12, "output_tokens": 3, "total_tokens": 15}));
    assert!(json["id"].as_str().unwrap().starts_with("resp_"));
    assert!(json.get("tool_calls").is_none());

    let bodies = harness.chat.received_bodies().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["model"], FAST_MODEL);
    assert_eq!(
        bodies[0]["messages"],
        json!([{"role": "user", "content": "What is the capital of France?"}])
    );
}

#[tokio::test]
async fn test_instructions_become_system_message() {
    let harness = TestHarness::new().await;
    harness.chat.mock_text_completion("Bonjour").await;

    let response = harness
        .post_responses(json!({
            "model": FAST_ALIAS,
            "instructions": "Answer in French.",
            "input": "Hello",
            "temperature": 0.2,
            "max_output_tokens": 64
        }))
        .await;

    response.assert_status_ok();
    let bodies = harness.chat.received_bodies().await;
    assert_eq!(bodies[0]["messages"][0], json!({"role": "system", "content": "Answer in French."}));
    assert_eq!(bodies[0]["messages"][1]["role"], "user");
    assert_eq!(bodies[0]["temperature"], 0.2);
    assert_eq!(bodies[0]["max_tokens"], 64);
}

#[tokio::test]
async fn test_tool_call_returned_with_raw_arguments() {
    let harness = TestHarness::new().await;
    harness
        .chat
        .mock_tool_call("call_abc", "get_weather", r#"{"location":"Paris"}"#)
        .await;

    let response = harness
        .post_responses(json!({
            "model": FAST_ALIAS,
            "input": "Weather in Paris?",
            "tools": [weather_tool()],
            "tool_choice": "auto"
        }))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(
        json["tool_calls"],
        json!([{"call_id": "call_abc", "name": "get_weather", "arguments": "{\"location\":\"Paris\"}"}])
    );

    let bodies = harness.chat.received_bodies().await;
    assert_eq!(bodies[0]["tools"][0]["type"], "function");
    assert_eq!(bodies[0]["tools"][0]["function"]["name"], "get_weather");
    assert_eq!(bodies[0]["tool_choice"], "auto");
}

#[tokio::test]
async fn test_tool_result_round_trip_in_history() {
    let harness = TestHarness::new().await;
    harness.chat.mock_text_completion("It is sunny in Paris.").await;

    let response = harness
        .post_responses(json!({
            "model": FAST_ALIAS,
            "tools": [weather_tool()],
            "input": [
                {"role": "user", "content": "Weather in Paris?"},
                {"type": "function_call", "call_id": "call_abc", "name": "get_weather", "arguments": "{\"location\":\"Paris\"}"},
                {"type": "function_call_output", "call_id": "call_abc", "output": "sunny, 21C"}
            ]
        }))
        .await;

    response.assert_status_ok();
    let bodies = harness.chat.received_bodies().await;
    let messages = bodies[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["tool_calls"][0]["id"], "call_abc");
    assert_eq!(
        messages[2],
        json!({"role": "tool", "tool_call_id": "call_abc", "content": "sunny, 21C"})
    );
}

// ============================================================================
// Anthropic and Gemini dialects
// ============================================================================

#[tokio::test]
async fn test_deep_think_alias_answers_through_anthropic() {
    let harness = TestHarness::new().await;
    harness.anthropic.mock_text_message("Let me think. 42.").await;

    let response = harness
        .post_responses(json!({
            "model": DEEP_THINK_ALIAS,
            "instructions": "Be brief.",
            "input": "Meaning of life?"
        }))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["model"], DEEP_THINK_ALIAS);
    assert_eq!(json["output_text"], "Let me think. 42.");
    assert_eq!(json["usage"]["total_tokens"], 25);

    let bodies = harness.anthropic.received_bodies().await;
    assert_eq!(bodies[0]["model"], DEEP_THINK_MODEL);
    assert_eq!(bodies[0]["system"], "Be brief.");
    assert_eq!(bodies[0]["max_tokens"], 4096);
    assert_eq!(bodies[0]["messages"][0]["role"], "user");
}

#[tokio::test]
async fn test_reasoning_effort_becomes_thinking_budget() {
    let harness = TestHarness::new().await;
    harness.anthropic.mock_text_message("42.").await;

    let response = harness
        .post_responses(json!({
            "model": DEEP_THINK_ALIAS,
            "input": "Meaning of life?",
            "reasoning": {"effort": "medium"},
            "temperature": 0.7
        }))
        .await;

    response.assert_status_ok();
    let bodies = harness.anthropic.received_bodies().await;
    assert_eq!(bodies[0]["thinking"], json!({"type": "enabled", "budget_tokens": 8192}));
    assert_eq!(bodies[0]["max_tokens"], 4096 + 8192);
    assert!(bodies[0].get("temperature").is_none());
}

#[tokio::test]
async fn test_reasoning_effort_on_edge_alias_rejected() {
    let harness = TestHarness::new().await;

    let response = harness
        .post_responses(json!({
            "model": EDGE_ALIAS,
            "input": "Think hard",
            "reasoning": {"effort": "high"}
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "unsupported_feature");
}

#[tokio::test]
async fn test_gemini_alias_answers_through_google() {
    let harness = TestHarness::new().await;
    harness.google.mock_generate_content(GEMINI_MODEL, "Hola").await;

    let response = harness
        .post_responses(json!({"model": GEMINI_ALIAS, "input": "Say hi in Spanish"}))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["output_text"], "Hola");
    assert_eq!(json["usage"], json!({"input_tokens": 7, "output_tokens": 2, "total_tokens": 9}));

    let bodies = harness.google.received_bodies().await;
    assert_eq!(bodies[0]["contents"][0]["role"], "user");
    assert_eq!(bodies[0]["contents"][0]["parts"][0]["text"], "Say hi in Spanish");
}

// ============================================================================
// Rejections and upstream failures
// ============================================================================

#[tokio::test]
async fn test_tools_on_edge_alias_rejected_before_dispatch() {
    let harness = TestHarness::new().await;

    let response = harness
        .post_responses(json!({
            "model": EDGE_ALIAS,
            "input": "Weather?",
            "tools": [weather_tool()]
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "unsupported_feature");
    assert!(harness.chat.received_bodies().await.is_empty());
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let harness = TestHarness::new().await;

    let response = harness.post_responses(json!({"input": "no model"})).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_empty_input_rejected() {
    let harness = TestHarness::new().await;

    let response = harness
        .post_responses(json!({"model": FAST_ALIAS, "input": []}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(harness.chat.received_bodies().await.is_empty());
}

#[tokio::test]
async fn test_upstream_error_passed_through_without_retry() {
    let harness = TestHarness::new().await;
    harness.chat.mock_error(503, "Service down for maintenance", 1).await;

    let response = harness
        .post_responses(json!({"model": FAST_ALIAS, "input": "Hello"}))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "upstream_error");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Service down for maintenance"));
    // `expect(1)` on the mock is verified when the harness drops
}

#[tokio::test]
async fn test_upstream_rate_limit_keeps_429() {
    let harness = TestHarness::new().await;
    harness.chat.mock_error(429, "Slow down", 1).await;

    let response = harness
        .post_responses(json!({"model": FAST_ALIAS, "input": "Hello"}))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let harness = TestHarness::with_config(|mut c| {
        c.request_timeout = Duration::from_millis(300);
        c
    })
    .await;
    harness.chat.mock_slow_completion(Duration::from_secs(2)).await;

    let response = harness
        .post_responses(json!({"model": FAST_ALIAS, "input": "Hello"}))
        .await;

    response.assert_status(StatusCode::GATEWAY_TIMEOUT);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "upstream_timeout");
}

#[tokio::test]
async fn test_unprefixed_responses_path() {
    let harness = TestHarness::new().await;
    harness.chat.mock_text_completion("Paris").await;

    let response = harness
        .server
        .post("/responses")
        .add_header(
            axum::http::header::AUTHORIZATION,
            crate::common::bearer(TEST_PROXY_TOKEN),
        )
        .json(&json!({"model": FAST_ALIAS, "input": "Capital of France?"}))
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["output_text"], "Paris");
}
