//! OpenAI Responses API translator
//!
//! The caller-facing API is itself Responses-shaped, so requests map almost one to
//! one. Streaming uses typed events (`response.output_text.delta`, ...).

use serde_json::{json, Map, Value};

use super::{
    parse_event, put_opt, read_u32, MessageTranslator, TranslationError, UpstreamRequest,
};
use crate::native::request::ResponsesRequest;
use crate::native::response::{ProviderOutput, ToolCallResult, Usage};
use crate::native::streaming::{StreamDecoder, StreamError, StreamUpdate, ToolCallAccumulator};
use crate::native::types::{Content, ContentPart, InputItem, Role};
use crate::registry::ProviderDescriptor;

/// OpenAI Responses API translator
#[derive(Debug, Clone, Default)]
pub struct OpenAITranslator;

fn message_content(role: Role, content: &Content) -> Value {
    let parts = match content {
        Content::Text(text) => return Value::String(text.clone()),
        Content::Parts(parts) => parts,
    };

    let text_type = if role == Role::Assistant {
        "output_text"
    } else {
        "input_text"
    };
    let converted: Vec<Value> = parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::InputText { text } | ContentPart::OutputText { text } => {
                Some(json!({"type": text_type, "text": text}))
            }
            ContentPart::InputImage {
                image_url: Some(url),
            } => Some(json!({"type": "input_image", "image_url": url})),
            _ => None,
        })
        .collect();
    Value::Array(converted)
}

fn input_item(item: &InputItem) -> Value {
    match item {
        InputItem::Message(m) => json!({
            "type": "message",
            "role": match m.role {
                Role::System => "system",
                Role::Developer => "developer",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            "content": message_content(m.role, &m.content),
        }),
        InputItem::FunctionCall {
            call_id,
            name,
            arguments,
        } => json!({
            "type": "function_call",
            "call_id": call_id,
            "name": name,
            "arguments": arguments,
        }),
        InputItem::FunctionCallOutput { call_id, output } => json!({
            "type": "function_call_output",
            "call_id": call_id,
            "output": output,
        }),
    }
}

fn usage_from(value: &Value) -> Option<Usage> {
    let usage = value.get("usage").filter(|u| u.is_object())?;
    Some(Usage::new(
        read_u32(usage, "input_tokens"),
        read_u32(usage, "output_tokens"),
    ))
}

fn function_call_from(item: &Value) -> Result<ToolCallResult, TranslationError> {
    let name = item
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| TranslationError::UnexpectedResponse("function_call without name".into()))?;
    let call_id = item
        .get("call_id")
        .or_else(|| item.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(ToolCallResult::generate_id);
    let arguments = match item.get("arguments").and_then(Value::as_str) {
        Some(args) if !args.trim().is_empty() => args.to_string(),
        _ => "{}".to_string(),
    };

    Ok(ToolCallResult {
        call_id,
        name: name.to_string(),
        arguments,
    })
}

impl MessageTranslator for OpenAITranslator {
    fn translate_request(
        &self,
        request: &ResponsesRequest,
        target: &ProviderDescriptor,
    ) -> Result<UpstreamRequest, TranslationError> {
        let input: Vec<Value> = request.items().iter().map(input_item).collect();

        let mut body = Map::new();
        body.insert("model".into(), json!(target.native_model_id));
        put_opt(&mut body, "instructions", request.instructions());
        body.insert("input".into(), Value::Array(input));

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body.insert("tools".into(), Value::Array(tools));
        }
        if let Some(choice) = &request.tool_choice {
            body.insert("tool_choice".into(), json!(choice));
        }

        put_opt(&mut body, "temperature", request.temperature);
        put_opt(&mut body, "top_p", request.top_p);
        put_opt(&mut body, "max_output_tokens", request.max_output_tokens);
        if let Some(effort) = request.reasoning_effort() {
            body.insert("reasoning".into(), json!({"effort": effort.as_str()}));
        }
        body.insert("stream".into(), json!(request.stream));

        Ok(UpstreamRequest {
            path: "/responses".to_string(),
            body: Value::Object(body),
            stream: request.stream,
        })
    }

    fn translate_response(&self, response: Value) -> Result<ProviderOutput, TranslationError> {
        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(TranslationError::UnexpectedResponse(format!(
                "response carries an error: {}",
                error
            )));
        }

        let items = response
            .get("output")
            .and_then(Value::as_array)
            .ok_or_else(|| TranslationError::UnexpectedResponse("missing output array".into()))?;

        let mut output = ProviderOutput {
            usage: usage_from(&response),
            ..Default::default()
        };

        for item in items {
            match item.get("type").and_then(Value::as_str) {
                Some("message") => {
                    let parts = item.get("content").and_then(Value::as_array);
                    for part in parts.into_iter().flatten() {
                        if part.get("type").and_then(Value::as_str) == Some("output_text") {
                            if let Some(text) = part.get("text").and_then(Value::as_str) {
                                output.text.push_str(text);
                            }
                        }
                    }
                }
                Some("function_call") => output.tool_calls.push(function_call_from(item)?),
                // reasoning summaries and built-in tool items are not forwarded
                _ => {}
            }
        }

        Ok(output)
    }

    fn stream_decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(ResponsesStreamDecoder::default())
    }
}

/// Decoder for Responses API typed stream events
#[derive(Debug, Default)]
pub struct ResponsesStreamDecoder {
    tool_calls: ToolCallAccumulator,
}

fn output_index(event: &Value) -> u32 {
    read_u32(event, "output_index")
}

impl StreamDecoder for ResponsesStreamDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<StreamUpdate>, StreamError> {
        if data.trim() == "[DONE]" {
            return Ok(Vec::new());
        }
        let event = parse_event(data)?;
        let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default();

        let mut updates = Vec::new();
        match event_type {
            "response.output_text.delta" => {
                if let Some(delta) = event.get("delta").and_then(Value::as_str) {
                    updates.push(StreamUpdate::Text(delta.to_string()));
                }
            }
            "response.output_item.added" => {
                let item = &event["item"];
                if item.get("type").and_then(Value::as_str) == Some("function_call") {
                    self.tool_calls.begin(
                        output_index(&event),
                        item.get("call_id").and_then(Value::as_str),
                        item.get("name").and_then(Value::as_str),
                    );
                }
            }
            "response.function_call_arguments.delta" => {
                if let Some(delta) = event.get("delta").and_then(Value::as_str) {
                    self.tool_calls.push_arguments(output_index(&event), delta);
                }
            }
            "response.function_call_arguments.done" => {
                if let Some(args) = event.get("arguments").and_then(Value::as_str) {
                    self.tool_calls.set_arguments(output_index(&event), args);
                }
            }
            "response.output_item.done" => {
                let item = &event["item"];
                if item.get("type").and_then(Value::as_str) == Some("function_call") {
                    let index = output_index(&event);
                    self.tool_calls.begin(
                        index,
                        item.get("call_id").and_then(Value::as_str),
                        item.get("name").and_then(Value::as_str),
                    );
                    if let Some(args) = item.get("arguments").and_then(Value::as_str) {
                        if !args.is_empty() {
                            self.tool_calls.set_arguments(index, args);
                        }
                    }
                    if let Some(call) = self.tool_calls.finalize_index(index)? {
                        updates.push(StreamUpdate::ToolCall(call));
                    }
                }
            }
            "response.completed" | "response.incomplete" => {
                updates.extend(
                    self.tool_calls
                        .finalize_all()?
                        .into_iter()
                        .map(StreamUpdate::ToolCall),
                );
                if let Some(usage) = usage_from(&event["response"]) {
                    updates.push(StreamUpdate::Usage(usage));
                }
                updates.push(StreamUpdate::Completed);
            }
            "response.failed" => {
                let error = &event["response"]["error"];
                return Err(StreamError::ProviderError {
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("response failed")
                        .to_string(),
                    code: error.get("code").and_then(Value::as_str).map(str::to_string),
                });
            }
            "error" => {
                return Err(StreamError::ProviderError {
                    message: event
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("stream error")
                        .to_string(),
                    code: event.get("code").and_then(Value::as_str).map(str::to_string),
                });
            }
            _ => {}
        }
        Ok(updates)
    }

    fn finish(&mut self) -> Result<Vec<StreamUpdate>, StreamError> {
        // Responses streams always end with response.completed
        Err(StreamError::ConnectionClosed)
    }
}
