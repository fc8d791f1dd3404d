//! Mock Chat Completions upstream

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::sse_body;

pub const CHAT_PATH: &str = "/v1/chat/completions";

/// Mock server speaking the Chat Completions dialect
pub struct MockOpenAIChat {
    pub server: MockServer,
}

impl MockOpenAIChat {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL a route should point at (`.../v1`)
    pub fn base_url(&self) -> String {
        format!("{}/v1", self.server.uri())
    }

    fn completions() -> wiremock::MockBuilder {
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(header("authorization", "Bearer test-key"))
    }

    /// Non-streaming text answer
    pub async fn mock_text_completion(&self, text: &str) {
        Self::completions()
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(text)))
            .mount(&self.server)
            .await;
    }

    /// Non-streaming answer that asks for one tool call
    pub async fn mock_tool_call(&self, call_id: &str, name: &str, arguments: &str) {
        let body = json!({
            "id": "chatcmpl-tool",
            "object": "chat.completion",
            "model": "llama-3.1-8b",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": call_id,
                        "type": "function",
                        "function": {"name": name, "arguments": arguments}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 30, "completion_tokens": 12, "total_tokens": 42}
        });

        Self::completions()
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Streamed text answer split into `deltas`
    pub async fn mock_streaming_text(&self, deltas: &[&str]) {
        let mut frames: Vec<String> = deltas
            .iter()
            .map(|d| json!({"choices": [{"index": 0, "delta": {"content": d}}]}).to_string())
            .collect();
        frames.push(json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}).to_string());
        frames.push(
            json!({"choices": [], "usage": {"prompt_tokens": 9, "completion_tokens": 4, "total_tokens": 13}})
                .to_string(),
        );
        frames.push("[DONE]".to_string());

        Self::completions()
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(frames), "text/event-stream"),
            )
            .mount(&self.server)
            .await;
    }

    /// Stream that stops after the given deltas without a finish marker
    pub async fn mock_truncated_stream(&self, deltas: &[&str]) {
        let frames: Vec<String> = deltas
            .iter()
            .map(|d| json!({"choices": [{"index": 0, "delta": {"content": d}}]}).to_string())
            .collect();

        Self::completions()
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(frames), "text/event-stream"),
            )
            .mount(&self.server)
            .await;
    }

    /// Upstream error with a JSON body, expected exactly `times` times
    pub async fn mock_error(&self, status: u16, message: &str, times: u64) {
        Self::completions()
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {"message": message, "type": "upstream_error"}
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer that arrives after `delay`
    pub async fn mock_slow_completion(&self, delay: std::time::Duration) {
        Self::completions()
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_completion("late"))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Bodies of every request the mock received
    pub async fn received_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }
}

pub fn chat_completion(text: &str) -> Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "llama-3.1-8b",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
    })
}
