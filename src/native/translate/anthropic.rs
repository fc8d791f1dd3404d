//! Anthropic Messages translator
//!
//! Anthropic has stricter requirements than the Responses input:
//! - System text goes to a separate `system` field, not the messages array
//! - Turns must alternate between user and assistant, starting with user
//! - Tool calls are `tool_use` blocks; tool results are `tool_result` blocks in a
//!   user turn
//! - Reasoning effort becomes an extended-thinking token budget

use serde_json::{json, Map, Value};

use super::{
    parse_arguments, parse_event, put_opt, read_u32, system_prompt, MessageTranslator,
    TranslationError, UpstreamRequest,
};
use crate::native::request::ResponsesRequest;
use crate::native::response::{ProviderOutput, ToolCallResult, Usage};
use crate::native::streaming::{StreamDecoder, StreamError, StreamUpdate, ToolCallAccumulator};
use crate::native::types::{Content, ContentPart, InputItem, Role, ToolChoice};
use crate::registry::ProviderDescriptor;

/// Anthropic requires `max_tokens`; used when the caller sets no limit
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Smallest `budget_tokens` Anthropic accepts for extended thinking
pub const MIN_THINKING_BUDGET: u32 = 1024;

/// `(max_tokens, thinking budget)` for the request
///
/// The budget must stay below `max_tokens`. A caller limit is the hard cap, so
/// the budget shrinks to fit it; without one, the budget is added on top of the
/// default answer allowance.
fn token_limits(request: &ResponsesRequest) -> Result<(u32, Option<u32>), TranslationError> {
    let Some(effort) = request.reasoning_effort() else {
        return Ok((request.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS), None));
    };

    match request.max_output_tokens {
        None => {
            let budget = effort.thinking_budget();
            Ok((DEFAULT_MAX_TOKENS.saturating_add(budget), Some(budget)))
        }
        Some(max) => {
            let budget = effort.thinking_budget().min(max.saturating_sub(1));
            if budget < MIN_THINKING_BUDGET {
                return Err(TranslationError::UnsupportedFeature(format!(
                    "reasoning on anthropic needs max_output_tokens above {}, got {}",
                    MIN_THINKING_BUDGET, max
                )));
            }
            Ok((max, Some(budget)))
        }
    }
}

/// Anthropic Messages API translator
#[derive(Debug, Clone, Default)]
pub struct AnthropicTranslator;

/// One Anthropic turn under construction
struct Turn {
    role: &'static str,
    blocks: Vec<Value>,
}

fn image_block(url: &Value) -> Option<Value> {
    let url = url.get("url").unwrap_or(url).as_str()?;
    if let Some(rest) = url.strip_prefix("data:") {
        let (media_type, data) = rest.split_once(";base64,")?;
        return Some(json!({
            "type": "image",
            "source": {"type": "base64", "media_type": media_type, "data": data},
        }));
    }
    Some(json!({"type": "image", "source": {"type": "url", "url": url}}))
}

fn content_blocks(content: &Content) -> Vec<Value> {
    match content {
        Content::Text(text) if text.is_empty() => Vec::new(),
        Content::Text(text) => vec![json!({"type": "text", "text": text})],
        Content::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::InputText { text } | ContentPart::OutputText { text }
                    if !text.is_empty() =>
                {
                    Some(json!({"type": "text", "text": text}))
                }
                ContentPart::InputImage {
                    image_url: Some(url),
                } => image_block(url),
                _ => None,
            })
            .collect(),
    }
}

/// Build alternating turns; adjacent blocks for the same role share a turn
fn build_turns(items: &[InputItem]) -> Result<Vec<Turn>, TranslationError> {
    let mut turns: Vec<Turn> = Vec::new();

    let mut push = |role: &'static str, blocks: Vec<Value>| {
        if blocks.is_empty() {
            return;
        }
        match turns.last_mut() {
            Some(last) if last.role == role => last.blocks.extend(blocks),
            _ => turns.push(Turn { role, blocks }),
        }
    };

    for item in items {
        match item {
            InputItem::Message(m) => match m.role {
                Role::System | Role::Developer => {}
                Role::User => push("user", content_blocks(&m.content)),
                Role::Assistant => push("assistant", content_blocks(&m.content)),
            },
            InputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => {
                let input = parse_arguments(call_id, arguments)?;
                push(
                    "assistant",
                    vec![json!({"type": "tool_use", "id": call_id, "name": name, "input": input})],
                );
            }
            InputItem::FunctionCallOutput { call_id, output } => push(
                "user",
                vec![json!({"type": "tool_result", "tool_use_id": call_id, "content": output})],
            ),
        }
    }

    Ok(turns)
}

/// Anthropic rejects conversations that open with an assistant turn
fn validate_turns(turns: &[Turn]) -> Result<(), TranslationError> {
    match turns.first() {
        None => Err(TranslationError::InvalidMessageFormat(
            "conversation has no user or assistant content".into(),
        )),
        Some(first) if first.role != "user" => Err(TranslationError::InvalidMessageFormat(
            "first non-system message must be from the user".into(),
        )),
        Some(_) => Ok(()),
    }
}

fn tool_choice_value(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({"type": "auto"}),
        ToolChoice::None => json!({"type": "none"}),
        ToolChoice::Required => json!({"type": "any"}),
        ToolChoice::Function(name) => json!({"type": "tool", "name": name}),
    }
}

fn error_from(value: &Value) -> StreamError {
    let error = value.get("error").unwrap_or(value);
    StreamError::ProviderError {
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("stream error")
            .to_string(),
        code: error.get("type").and_then(Value::as_str).map(str::to_string),
    }
}

impl MessageTranslator for AnthropicTranslator {
    fn translate_request(
        &self,
        request: &ResponsesRequest,
        target: &ProviderDescriptor,
    ) -> Result<UpstreamRequest, TranslationError> {
        let items = request.items();
        let turns = build_turns(&items)?;
        validate_turns(&turns)?;

        let messages: Vec<Value> = turns
            .into_iter()
            .map(|t| json!({"role": t.role, "content": t.blocks}))
            .collect();

        let (max_tokens, thinking_budget) = token_limits(request)?;
        if thinking_budget.is_some()
            && matches!(
                request.tool_choice,
                Some(ToolChoice::Required) | Some(ToolChoice::Function(_))
            )
        {
            return Err(TranslationError::UnsupportedFeature(
                "anthropic cannot force a tool call while reasoning; use tool_choice 'auto'"
                    .to_string(),
            ));
        }

        let mut body = Map::new();
        body.insert("model".into(), json!(target.native_model_id));
        body.insert("messages".into(), Value::Array(messages));
        body.insert("max_tokens".into(), json!(max_tokens));
        put_opt(&mut body, "system", system_prompt(request, &items));
        if let Some(budget) = thinking_budget {
            body.insert(
                "thinking".into(),
                json!({"type": "enabled", "budget_tokens": budget}),
            );
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    let mut tool = json!({"name": t.name, "input_schema": t.parameters});
                    if !t.description.is_empty() {
                        tool["description"] = json!(t.description);
                    }
                    tool
                })
                .collect();
            body.insert("tools".into(), Value::Array(tools));
        }
        if let Some(choice) = &request.tool_choice {
            body.insert("tool_choice".into(), tool_choice_value(choice));
        }

        // Extended thinking rejects sampling overrides
        if thinking_budget.is_none() {
            put_opt(&mut body, "temperature", request.temperature);
            put_opt(&mut body, "top_p", request.top_p);
        }
        body.insert("stream".into(), json!(request.stream));

        Ok(UpstreamRequest {
            path: "/messages".to_string(),
            body: Value::Object(body),
            stream: request.stream,
        })
    }

    fn translate_response(&self, response: Value) -> Result<ProviderOutput, TranslationError> {
        if response.get("type").and_then(Value::as_str) == Some("error") {
            return Err(TranslationError::UnexpectedResponse(
                response["error"]["message"]
                    .as_str()
                    .unwrap_or("error response")
                    .to_string(),
            ));
        }
        let blocks = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| TranslationError::UnexpectedResponse("missing content array".into()))?;

        let mut output = ProviderOutput::default();
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    output
                        .text
                        .push_str(block.get("text").and_then(Value::as_str).unwrap_or_default());
                }
                Some("tool_use") => {
                    let name = block
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| TranslationError::UnexpectedResponse("tool_use without name".into()))?;
                    let arguments = match block.get("input") {
                        Some(Value::Null) | None => "{}".to_string(),
                        Some(input) => input.to_string(),
                    };
                    output.tool_calls.push(ToolCallResult {
                        call_id: block
                            .get("id")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(ToolCallResult::generate_id),
                        name: name.to_string(),
                        arguments,
                    });
                }
                // thinking, redacted_thinking, ...
                _ => {}
            }
        }

        output.usage = response.get("usage").map(|u| {
            Usage::new(read_u32(u, "input_tokens"), read_u32(u, "output_tokens"))
        });
        Ok(output)
    }

    fn stream_decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(AnthropicStreamDecoder::default())
    }
}

/// Decoder for Anthropic's typed event stream
#[derive(Debug, Default)]
pub struct AnthropicStreamDecoder {
    tool_calls: ToolCallAccumulator,
    input_tokens: u32,
    output_tokens: u32,
}

impl StreamDecoder for AnthropicStreamDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<StreamUpdate>, StreamError> {
        let event = parse_event(data)?;
        let index = match event.get("index").and_then(Value::as_u64) {
            Some(i) => u32::try_from(i).map_err(|_| {
                StreamError::ParseError(format!("content block index {} out of range", i))
            })?,
            None => 0,
        };
        let mut updates = Vec::new();

        match event.get("type").and_then(Value::as_str).unwrap_or_default() {
            "message_start" => {
                if let Some(usage) = event["message"].get("usage") {
                    self.input_tokens = read_u32(usage, "input_tokens");
                    self.output_tokens = read_u32(usage, "output_tokens");
                }
            }
            "content_block_start" => {
                let block = &event["content_block"];
                match block.get("type").and_then(Value::as_str) {
                    Some("tool_use") => {
                        self.tool_calls.begin(
                            index,
                            block.get("id").and_then(Value::as_str),
                            block.get("name").and_then(Value::as_str),
                        );
                    }
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            if !text.is_empty() {
                                updates.push(StreamUpdate::Text(text.to_string()));
                            }
                        }
                    }
                    _ => {}
                }
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => {
                        if let Some(text) = delta.get("text").and_then(Value::as_str) {
                            updates.push(StreamUpdate::Text(text.to_string()));
                        }
                    }
                    Some("input_json_delta") if self.tool_calls.contains(index) => {
                        if let Some(partial) = delta.get("partial_json").and_then(Value::as_str) {
                            self.tool_calls.push_arguments(index, partial);
                        }
                    }
                    _ => {}
                }
            }
            "content_block_stop" => {
                if let Some(call) = self.tool_calls.finalize_index(index)? {
                    updates.push(StreamUpdate::ToolCall(call));
                }
            }
            "message_delta" => {
                if let Some(usage) = event.get("usage") {
                    if usage.get("input_tokens").is_some() {
                        self.input_tokens = read_u32(usage, "input_tokens");
                    }
                    self.output_tokens = read_u32(usage, "output_tokens");
                }
            }
            "message_stop" => {
                updates.extend(
                    self.tool_calls
                        .finalize_all()?
                        .into_iter()
                        .map(StreamUpdate::ToolCall),
                );
                updates.push(StreamUpdate::Usage(Usage::new(
                    self.input_tokens,
                    self.output_tokens,
                )));
                updates.push(StreamUpdate::Completed);
            }
            "error" => return Err(error_from(&event)),
            // ping
            _ => {}
        }

        Ok(updates)
    }

    fn finish(&mut self) -> Result<Vec<StreamUpdate>, StreamError> {
        Err(StreamError::ConnectionClosed)
    }
}
