//! Translation layer between the Responses API and provider wire formats
//!
//! Each [`Dialect`] has a [`MessageTranslator`] that builds the upstream request,
//! reads a complete upstream response, and creates a per-call stream decoder.
//! Translators are stateless; all per-call stream state lives in the decoder.

pub mod anthropic;
pub mod cloudflare;
pub mod google;
pub mod openai;
pub mod openai_chat;

use serde_json::{Map, Value};
use thiserror::Error;

use super::request::ResponsesRequest;
use super::response::ProviderOutput;
use super::streaming::StreamDecoder;
use super::types::{InputItem, Role};
use crate::error::AppError;
use crate::registry::{Dialect, ProviderDescriptor};

/// Errors that can occur during message translation
#[derive(Debug, Error, PartialEq)]
pub enum TranslationError {
    /// Message format is invalid for the target provider
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// The target provider cannot express this request
    #[error("{0}")]
    UnsupportedFeature(String),

    /// Malformed arguments in a function_call input item
    #[error("Malformed tool call arguments: {0}")]
    MalformedArguments(String),

    /// Tool call ID not found in conversation history
    #[error("No function_call found in input for call_id: {0}")]
    MissingToolCallInHistory(String),

    /// Upstream response did not have the expected shape
    #[error("Unexpected upstream response: {0}")]
    UnexpectedResponse(String),
}

impl TranslationError {
    pub fn into_app_error(self, provider: &str) -> AppError {
        match self {
            TranslationError::UnsupportedFeature(msg) => AppError::UnsupportedFeature(msg),
            TranslationError::UnexpectedResponse(message) => AppError::MalformedUpstreamResponse {
                provider: provider.to_string(),
                message,
            },
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

/// A request ready for the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    /// Path relative to the descriptor's endpoint base, query included
    pub path: String,
    pub body: Value,
    pub stream: bool,
}

/// Bidirectional translation for one provider dialect
pub trait MessageTranslator: Send + Sync {
    /// Build the upstream request for `request` addressed to `target`
    fn translate_request(
        &self,
        request: &ResponsesRequest,
        target: &ProviderDescriptor,
    ) -> Result<UpstreamRequest, TranslationError>;

    /// Read a complete (non-streaming) upstream response body
    fn translate_response(&self, response: Value) -> Result<ProviderOutput, TranslationError>;

    /// Fresh decoder for one streamed call
    fn stream_decoder(&self) -> Box<dyn StreamDecoder>;
}

static OPENAI: openai::OpenAITranslator = openai::OpenAITranslator;
static OPENAI_CHAT: openai_chat::OpenAIChatTranslator = openai_chat::OpenAIChatTranslator;
static ANTHROPIC: anthropic::AnthropicTranslator = anthropic::AnthropicTranslator;
static GOOGLE: google::GoogleTranslator = google::GoogleTranslator;
static CLOUDFLARE: cloudflare::CloudflareTranslator = cloudflare::CloudflareTranslator;

/// Translator for a dialect
pub fn translator_for(dialect: Dialect) -> &'static dyn MessageTranslator {
    match dialect {
        Dialect::OpenAi => &OPENAI,
        Dialect::OpenAiChat => &OPENAI_CHAT,
        Dialect::Anthropic => &ANTHROPIC,
        Dialect::Google => &GOOGLE,
        Dialect::CloudflareAi => &CLOUDFLARE,
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Parse `function_call.arguments` for dialects that need a JSON object
pub(crate) fn parse_arguments(call_id: &str, arguments: &str) -> Result<Value, TranslationError> {
    if arguments.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(arguments)
        .map_err(|e| TranslationError::MalformedArguments(format!("call_id {}: {}", call_id, e)))
}

/// Instructions plus any system/developer messages, joined by blank lines
pub(crate) fn system_prompt(request: &ResponsesRequest, items: &[InputItem]) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(instructions) = request.instructions() {
        parts.push(instructions.to_string());
    }
    for item in items {
        if let InputItem::Message(m) = item {
            if m.role.is_system() {
                let text = m.content.as_text();
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }
    }
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

/// Role to use for a non-system message on chat-style wires
pub(crate) fn chat_role(role: Role) -> &'static str {
    match role {
        Role::System | Role::Developer => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Insert `value` under `key` when present
pub(crate) fn put_opt<T: Into<Value>>(body: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(v) = value {
        body.insert(key.to_string(), v.into());
    }
}

/// Read an unsigned counter from a JSON object
pub(crate) fn read_u32(value: &Value, key: &str) -> u32 {
    value
        .get(key)
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Parse a `data:` payload as JSON
pub(crate) fn parse_event(data: &str) -> Result<Value, super::streaming::StreamError> {
    serde_json::from_str(data).map_err(|e| {
        super::streaming::StreamError::ParseError(format!("invalid JSON event: {}", e))
    })
}
