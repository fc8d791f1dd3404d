//! Chat Completions translator
//!
//! Serves every OpenAI-compatible `/chat/completions` upstream (NVIDIA NIM, Groq,
//! DeepSeek, Zhipu, ...). Tool-call history becomes assistant `tool_calls` plus
//! `tool` role messages.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use super::{
    chat_role, parse_event, put_opt, read_u32, system_prompt, MessageTranslator,
    TranslationError, UpstreamRequest,
};
use crate::native::request::ResponsesRequest;
use crate::native::response::{ProviderOutput, ToolCallResult, Usage};
use crate::native::streaming::{StreamDecoder, StreamError, StreamUpdate, ToolCallAccumulator};
use crate::native::types::{Content, ContentPart, InputItem, ToolChoice};
use crate::registry::ProviderDescriptor;

/// Chat Completions translator
#[derive(Debug, Clone, Default)]
pub struct OpenAIChatTranslator;

fn chat_content(content: &Content) -> Value {
    if !content.has_images() {
        return Value::String(content.as_text());
    }
    let Content::Parts(parts) = content else {
        return Value::String(content.as_text());
    };
    let converted: Vec<Value> = parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::InputText { text } | ContentPart::OutputText { text } => {
                Some(json!({"type": "text", "text": text}))
            }
            ContentPart::InputImage {
                image_url: Some(url),
            } => {
                let url = url.get("url").cloned().unwrap_or_else(|| url.clone());
                Some(json!({"type": "image_url", "image_url": {"url": url}}))
            }
            _ => None,
        })
        .collect();
    Value::Array(converted)
}

fn build_messages(request: &ResponsesRequest) -> Vec<Value> {
    let items = request.items();
    let mut messages: Vec<Value> = Vec::with_capacity(items.len() + 1);

    if let Some(system) = system_prompt(request, &items) {
        messages.push(json!({"role": "system", "content": system}));
    }

    for item in &items {
        match item {
            InputItem::Message(m) if m.role.is_system() => {}
            InputItem::Message(m) => {
                messages.push(json!({"role": chat_role(m.role), "content": chat_content(&m.content)}));
            }
            InputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => {
                let call = json!({
                    "id": call_id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments},
                });
                // Parallel calls share one assistant turn
                let last_is_assistant = messages
                    .last()
                    .map(|m| m["role"] == "assistant")
                    .unwrap_or(false);
                if last_is_assistant {
                    if let Some(last) = messages.last_mut().and_then(Value::as_object_mut) {
                        match last.get_mut("tool_calls").and_then(Value::as_array_mut) {
                            Some(calls) => calls.push(call),
                            None => {
                                last.insert("tool_calls".into(), json!([call]));
                            }
                        }
                        continue;
                    }
                }
                messages.push(json!({"role": "assistant", "content": null, "tool_calls": [call]}));
            }
            InputItem::FunctionCallOutput { call_id, output } => {
                messages.push(json!({"role": "tool", "tool_call_id": call_id, "content": output}));
            }
        }
    }

    messages
}

fn tool_choice_value(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

/// Some compatible servers return arguments as an object instead of a string
fn arguments_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) | Some(Value::Null) | None => "{}".to_string(),
        Some(other) => other.to_string(),
    }
}

fn usage_from(value: &Value) -> Option<Usage> {
    let usage = value.get("usage").filter(|u| u.is_object())?;
    Some(Usage::new(
        read_u32(usage, "prompt_tokens"),
        read_u32(usage, "completion_tokens"),
    ))
}

impl MessageTranslator for OpenAIChatTranslator {
    fn translate_request(
        &self,
        request: &ResponsesRequest,
        target: &ProviderDescriptor,
    ) -> Result<UpstreamRequest, TranslationError> {
        let mut body = Map::new();
        body.insert("model".into(), json!(target.native_model_id));
        body.insert("messages".into(), Value::Array(build_messages(request)));

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), Value::Array(tools));
        }
        if let Some(choice) = &request.tool_choice {
            body.insert("tool_choice".into(), tool_choice_value(choice));
        }

        put_opt(&mut body, "temperature", request.temperature);
        put_opt(&mut body, "top_p", request.top_p);
        put_opt(&mut body, "max_tokens", request.max_output_tokens);
        put_opt(&mut body, "reasoning_effort", request.reasoning_effort().map(|e| e.as_str()));
        body.insert("stream".into(), json!(request.stream));
        if request.stream {
            body.insert("stream_options".into(), json!({"include_usage": true}));
        }

        Ok(UpstreamRequest {
            path: "/chat/completions".to_string(),
            body: Value::Object(body),
            stream: request.stream,
        })
    }

    fn translate_response(&self, response: Value) -> Result<ProviderOutput, TranslationError> {
        let message = response
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| TranslationError::UnexpectedResponse("missing choices[0].message".into()))?;

        let text = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut tool_calls = Vec::new();
        for call in message
            .get("tool_calls")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let function = &call["function"];
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| TranslationError::UnexpectedResponse("tool call without name".into()))?;
            tool_calls.push(ToolCallResult {
                call_id: call
                    .get("id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(ToolCallResult::generate_id),
                name: name.to_string(),
                arguments: arguments_text(function.get("arguments")),
            });
        }

        Ok(ProviderOutput {
            text,
            tool_calls,
            usage: usage_from(&response),
        })
    }

    fn stream_decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(ChatStreamDecoder::default())
    }
}

/// Decoder for `chat.completion.chunk` streams
#[derive(Debug, Default)]
pub struct ChatStreamDecoder {
    tool_calls: ToolCallAccumulator,
    /// Upstream `index` -> accumulator slot
    slots: HashMap<u32, u32>,
    last_slot: Option<u32>,
    next_slot: u32,
    finish_seen: bool,
}

impl ChatStreamDecoder {
    fn open_slot(&mut self) -> u32 {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    /// Pick the accumulator slot for one tool-call fragment
    ///
    /// Not every compatible server sends `index`. Without it, a fragment that
    /// carries a name or a different id starts a new call, and a bare argument
    /// fragment continues the previous one. A known index whose id changes also
    /// starts a new call.
    fn slot_for(&mut self, index: Option<u32>, id: Option<&str>, name: Option<&str>) -> u32 {
        let id = id.filter(|id| !id.is_empty());
        let slot = match index {
            Some(index) => match self.slots.get(&index).copied() {
                Some(slot) if !self.id_conflicts(slot, id) => slot,
                _ => {
                    let slot = self.open_slot();
                    self.slots.insert(index, slot);
                    slot
                }
            },
            None => {
                let starts_call = id.is_some() || name.map_or(false, |n| !n.is_empty());
                match self.last_slot {
                    Some(last) if !starts_call => last,
                    Some(last) if id.is_some() && self.tool_calls.call_id(last) == id => last,
                    _ => self.open_slot(),
                }
            }
        };
        self.last_slot = Some(slot);
        slot
    }

    fn id_conflicts(&self, slot: u32, id: Option<&str>) -> bool {
        match (self.tool_calls.call_id(slot), id) {
            (Some(known), Some(id)) => known != id,
            _ => false,
        }
    }

    fn flush_tool_calls(&mut self, updates: &mut Vec<StreamUpdate>) -> Result<(), StreamError> {
        updates.extend(
            self.tool_calls
                .finalize_all()?
                .into_iter()
                .map(StreamUpdate::ToolCall),
        );
        Ok(())
    }
}

impl StreamDecoder for ChatStreamDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<StreamUpdate>, StreamError> {
        let mut updates = Vec::new();

        if data.trim() == "[DONE]" {
            self.flush_tool_calls(&mut updates)?;
            updates.push(StreamUpdate::Completed);
            return Ok(updates);
        }

        let chunk = parse_event(data)?;
        if let Some(error) = chunk.get("error").filter(|e| !e.is_null()) {
            return Err(StreamError::ProviderError {
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("stream error")
                    .to_string(),
                code: error
                    .get("code")
                    .and_then(|c| c.as_str().map(str::to_string).or_else(|| Some(c.to_string())))
                    .filter(|c| c != "null"),
            });
        }

        if let Some(choice) = chunk
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
        {
            let delta = &choice["delta"];
            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                updates.push(StreamUpdate::Text(text.to_string()));
            }

            for call in delta
                .get("tool_calls")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let function = &call["function"];
                let id = call.get("id").and_then(Value::as_str);
                let name = function.get("name").and_then(Value::as_str);
                let index = call
                    .get("index")
                    .and_then(Value::as_u64)
                    .and_then(|i| u32::try_from(i).ok());

                let slot = self.slot_for(index, id, name);
                self.tool_calls.begin(slot, id, name);
                match function.get("arguments") {
                    Some(Value::String(fragment)) => self.tool_calls.push_arguments(slot, fragment),
                    Some(Value::Null) | None => {}
                    Some(other) => self.tool_calls.set_arguments(slot, &other.to_string()),
                }
            }

            if choice.get("finish_reason").map_or(false, |r| !r.is_null()) {
                self.finish_seen = true;
                self.flush_tool_calls(&mut updates)?;
            }
        }

        if let Some(usage) = usage_from(&chunk) {
            updates.push(StreamUpdate::Usage(usage));
        }

        Ok(updates)
    }

    fn finish(&mut self) -> Result<Vec<StreamUpdate>, StreamError> {
        // Some compatible servers close the body without sending [DONE]
        if !self.finish_seen {
            return Err(StreamError::ConnectionClosed);
        }
        let mut updates = Vec::new();
        self.flush_tool_calls(&mut updates)?;
        updates.push(StreamUpdate::Completed);
        Ok(updates)
    }
}
