//! Response types for the Responses API
//!
//! Defines the normalized complete response and the per-event shape used when
//! streaming.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }
}

/// A complete tool call requested by the model
///
/// `arguments` is the raw JSON text produced upstream, forwarded byte-for-byte.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallResult {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallResult {
    /// Generate a call id for upstreams that do not assign one
    pub fn generate_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// Dialect-independent result of one upstream call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderOutput {
    pub text: String,
    pub tool_calls: Vec<ToolCallResult>,
    pub usage: Option<Usage>,
}

/// Text segment of an output message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputText {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
    #[serde(default)]
    pub annotations: Vec<Value>,
}

/// Responses-style output item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        id: String,
        status: String,
        role: String,
        content: Vec<OutputText>,
    },
    FunctionCall {
        id: String,
        call_id: String,
        name: String,
        arguments: String,
        status: String,
    },
}

/// Normalized non-streaming response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedResponse {
    /// Unique identifier (format: resp_{uuid})
    pub id: String,
    /// Object type (always "response")
    pub object: String,
    /// Unix timestamp of creation
    pub created_at: i64,
    /// The alias the caller asked for
    pub model: String,
    pub status: String,
    pub output_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallResult>,
    pub output: Vec<OutputItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl NormalizedResponse {
    pub fn from_output(alias: &str, output: ProviderOutput) -> Self {
        let mut items = Vec::with_capacity(output.tool_calls.len() + 1);
        if !output.text.is_empty() {
            items.push(OutputItem::Message {
                id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
                status: "completed".to_string(),
                role: "assistant".to_string(),
                content: vec![OutputText {
                    content_type: "output_text".to_string(),
                    text: output.text.clone(),
                    annotations: Vec::new(),
                }],
            });
        }
        items.extend(output.tool_calls.iter().map(|call| OutputItem::FunctionCall {
            id: format!("fc_{}", uuid::Uuid::new_v4().simple()),
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            status: "completed".to_string(),
        }));

        Self {
            id: format!("resp_{}", uuid::Uuid::new_v4().simple()),
            object: "response".to_string(),
            created_at: chrono::Utc::now().timestamp(),
            model: alias.to_string(),
            status: "completed".to_string(),
            output_text: output.text,
            tool_calls: output.tool_calls,
            output: items,
            usage: output.usage,
        }
    }
}

/// Error carried by a failed terminal event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventError {
    pub code: String,
    pub message: String,
}

/// One streamed event
///
/// Exactly one event per stream has `done = true`, and it is always the last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedEvent {
    pub delta_text: Option<String>,
    pub tool_call_delta: Option<ToolCallResult>,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EventError>,
}

impl NormalizedEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta_text: Some(delta.into()),
            tool_call_delta: None,
            done: false,
            usage: None,
            error: None,
        }
    }

    pub fn tool_call(call: ToolCallResult) -> Self {
        Self {
            delta_text: None,
            tool_call_delta: Some(call),
            done: false,
            usage: None,
            error: None,
        }
    }

    pub fn completed(usage: Option<Usage>) -> Self {
        Self {
            delta_text: None,
            tool_call_delta: None,
            done: true,
            usage,
            error: None,
        }
    }

    pub fn failed(err: &AppError) -> Self {
        Self {
            delta_text: None,
            tool_call_delta: None,
            done: true,
            usage: None,
            error: Some(EventError {
                code: err.code().to_string(),
                message: err.public_message(),
            }),
        }
    }
}
