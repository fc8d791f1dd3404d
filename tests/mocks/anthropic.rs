//! Mock Anthropic Messages upstream

use serde_json::{json, Value};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::sse_body;

pub const MESSAGES_PATH: &str = "/v1/messages";

pub struct MockAnthropic {
    pub server: MockServer,
}

impl MockAnthropic {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}/v1", self.server.uri())
    }

    fn messages() -> wiremock::MockBuilder {
        Mock::given(method("POST"))
            .and(path(MESSAGES_PATH))
            .and(header("x-api-key", "test-key"))
            .and(header_exists("anthropic-version"))
    }

    pub async fn mock_text_message(&self, text: &str) {
        let body = json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 20, "output_tokens": 5}
        });

        Self::messages()
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Streamed tool call whose arguments arrive as `argument_parts`
    pub async fn mock_streaming_tool_call(&self, call_id: &str, name: &str, argument_parts: &[&str]) {
        let mut frames = vec![
            json!({"type": "message_start", "message": {"id": "msg_02", "usage": {"input_tokens": 40, "output_tokens": 1}}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": call_id, "name": name, "input": {}}}),
        ];
        for part in argument_parts {
            frames.push(json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": {"type": "input_json_delta", "partial_json": part}
            }));
        }
        frames.push(json!({"type": "content_block_stop", "index": 0}));
        frames.push(json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 18}}));
        frames.push(json!({"type": "message_stop"}));

        self.mount_stream(frames).await;
    }

    /// Stream that reports an overload after some text
    pub async fn mock_stream_error(&self, text: &str) {
        let frames = vec![
            json!({"type": "message_start", "message": {"id": "msg_03", "usage": {"input_tokens": 10, "output_tokens": 1}}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}}),
            json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        ];
        self.mount_stream(frames).await;
    }

    async fn mount_stream(&self, frames: Vec<Value>) {
        let body = sse_body(frames.iter().map(|f| f.to_string()));
        Self::messages()
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&self.server)
            .await;
    }

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
