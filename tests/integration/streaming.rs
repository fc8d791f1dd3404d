//! Streaming Responses API integration tests
//!
//! Every stream must end with exactly one `done` event, and nothing may follow it.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{constants::*, parse_sse_events, TestHarness};

fn concatenated_text(events: &[Value]) -> String {
    events
        .iter()
        .filter_map(|e| e["delta_text"].as_str())
        .collect()
}

fn assert_single_terminal(events: &[Value]) {
    let done: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e["done"] == true)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(done, vec![events.len() - 1], "exactly one terminal event, in last position");
}

#[tokio::test]
async fn test_stream_headers_and_text_deltas() {
    let harness = TestHarness::new().await;
    harness.chat.mock_streaming_text(&["Par", "is"]).await;

    let response = harness
        .post_responses(json!({"model": FAST_ALIAS, "input": "Capital of France?", "stream": true}))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "text/event-stream");
    assert_eq!(response.header("cache-control"), "no-cache");

    let events = parse_sse_events(&response.text());
    assert_single_terminal(&events);
    assert_eq!(concatenated_text(&events), "Paris");

    let last = events.last().unwrap();
    assert!(last.get("error").is_none());
    assert_eq!(last["usage"], json!({"input_tokens": 9, "output_tokens": 4, "total_tokens": 13}));

    let bodies = harness.chat.received_bodies().await;
    assert_eq!(bodies[0]["stream"], true);
    assert_eq!(bodies[0]["stream_options"]["include_usage"], true);
}

#[tokio::test]
async fn test_streamed_text_matches_non_streamed_output() {
    let harness = TestHarness::new().await;
    harness.chat.mock_text_completion("Paris").await;
    harness.chat.mock_streaming_text(&["Pa", "r", "is"]).await;

    let complete: Value = harness
        .post_responses(json!({"model": FAST_ALIAS, "input": "Capital of France?"}))
        .await
        .json();
    let streamed = harness
        .post_responses(json!({"model": FAST_ALIAS, "input": "Capital of France?", "stream": true}))
        .await;

    let events = parse_sse_events(&streamed.text());
    assert_eq!(concatenated_text(&events), complete["output_text"].as_str().unwrap());
}

#[tokio::test]
async fn test_anthropic_tool_call_streamed_in_parts_arrives_once() {
    let harness = TestHarness::new().await;
    harness
        .anthropic
        .mock_streaming_tool_call("toolu_01", "get_weather", &[r#"{"location":"#, r#""Tokyo"}"#])
        .await;

    let response = harness
        .post_responses(json!({
            "model": DEEP_THINK_ALIAS,
            "input": "Weather in Tokyo?",
            "stream": true,
            "tools": [{
                "type": "function",
                "name": "get_weather",
                "description": "Current weather",
                "parameters": {"type": "object", "properties": {"location": {"type": "string"}}}
            }]
        }))
        .await;

    response.assert_status_ok();
    let events = parse_sse_events(&response.text());
    assert_single_terminal(&events);

    let calls: Vec<&Value> = events
        .iter()
        .filter(|e| !e["tool_call_delta"].is_null())
        .map(|e| &e["tool_call_delta"])
        .collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["call_id"], "toolu_01");
    assert_eq!(calls[0]["name"], "get_weather");
    let arguments: Value = serde_json::from_str(calls[0]["arguments"].as_str().unwrap()).unwrap();
    assert_eq!(arguments, json!({"location": "Tokyo"}));

    let last = events.last().unwrap();
    assert_eq!(last["usage"]["input_tokens"], 40);
    assert_eq!(last["usage"]["output_tokens"], 18);

    let bodies = harness.anthropic.received_bodies().await;
    assert_eq!(bodies[0]["tools"][0]["name"], "get_weather");
    assert_eq!(bodies[0]["stream"], true);
}

#[tokio::test]
async fn test_gemini_stream_text() {
    let harness = TestHarness::new().await;
    harness
        .google
        .mock_stream_generate_content(GEMINI_MODEL, &["Ho", "la"])
        .await;

    let response = harness
        .post_responses(json!({"model": GEMINI_ALIAS, "input": "Hi in Spanish", "stream": true}))
        .await;

    response.assert_status_ok();
    let events = parse_sse_events(&response.text());
    assert_single_terminal(&events);
    assert_eq!(concatenated_text(&events), "Hola");
    assert_eq!(events.last().unwrap()["usage"]["total_tokens"], 11);
}

#[tokio::test]
async fn test_truncated_stream_ends_with_error_event() {
    let harness = TestHarness::new().await;
    harness.chat.mock_truncated_stream(&["Once upon", " a time"]).await;

    let response = harness
        .post_responses(json!({"model": FAST_ALIAS, "input": "Tell a story", "stream": true}))
        .await;

    // The stream was already open, so the failure arrives in-band
    response.assert_status_ok();
    let events = parse_sse_events(&response.text());
    assert_single_terminal(&events);
    assert_eq!(concatenated_text(&events), "Once upon a time");
    assert_eq!(events.last().unwrap()["error"]["code"], "upstream_unreachable");
}

#[tokio::test]
async fn test_provider_error_inside_stream() {
    let harness = TestHarness::new().await;
    harness.anthropic.mock_stream_error("Partial").await;

    let response = harness
        .post_responses(json!({"model": DEEP_THINK_ALIAS, "input": "Hi", "stream": true}))
        .await;

    response.assert_status_ok();
    let events = parse_sse_events(&response.text());
    assert_single_terminal(&events);
    assert_eq!(concatenated_text(&events), "Partial");

    let error = &events.last().unwrap()["error"];
    assert_eq!(error["code"], "upstream_error");
    assert!(error["message"].as_str().unwrap().contains("Overloaded"));
}

#[tokio::test]
async fn test_stream_rejected_before_open_is_plain_http_error() {
    let harness = TestHarness::new().await;
    harness.chat.mock_error(429, "Slow down", 1).await;

    let response = harness
        .post_responses(json!({"model": FAST_ALIAS, "input": "Hello", "stream": true}))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "upstream_error");
}

#[tokio::test]
async fn test_stream_unknown_model_is_not_found() {
    let harness = TestHarness::new().await;

    let response = harness
        .post_responses(json!({"model": "nope", "input": "Hello", "stream": true}))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert!(harness.chat.received_bodies().await.is_empty());
}
