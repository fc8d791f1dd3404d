//! Google Gemini `generateContent` translator

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use super::{
    parse_arguments, parse_event, put_opt, read_u32, system_prompt, MessageTranslator,
    TranslationError, UpstreamRequest,
};
use crate::native::request::ResponsesRequest;
use crate::native::response::{ProviderOutput, ToolCallResult, Usage};
use crate::native::streaming::{StreamDecoder, StreamError, StreamUpdate};
use crate::native::types::{Content, ContentPart, InputItem, Role, ToolChoice};
use crate::registry::ProviderDescriptor;

/// Schema keywords Gemini rejects in function declarations
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties"];

/// Gemini translator
#[derive(Debug, Clone, Default)]
pub struct GoogleTranslator;

fn parts_for(content: &Content) -> Vec<Value> {
    match content {
        Content::Text(text) if text.is_empty() => Vec::new(),
        Content::Text(text) => vec![json!({"text": text})],
        Content::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::InputText { text } | ContentPart::OutputText { text }
                    if !text.is_empty() =>
                {
                    Some(json!({"text": text}))
                }
                ContentPart::InputImage {
                    image_url: Some(url),
                } => {
                    let url = url.get("url").unwrap_or(url).as_str()?;
                    let (mime_type, data) = url.strip_prefix("data:")?.split_once(";base64,")?;
                    Some(json!({"inlineData": {"mimeType": mime_type, "data": data}}))
                }
                _ => None,
            })
            .collect(),
    }
}

fn clean_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| {
                    let cleaned = match (k.as_str(), v) {
                        // Keys of a properties map are parameter names, not keywords
                        ("properties", Value::Object(props)) => Value::Object(
                            props.iter().map(|(name, s)| (name.clone(), clean_schema(s))).collect(),
                        ),
                        _ => clean_schema(v),
                    };
                    (k.clone(), cleaned)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(clean_schema).collect()),
        other => other.clone(),
    }
}

fn build_contents(items: &[InputItem]) -> Result<Vec<Value>, TranslationError> {
    // functionResponse needs the function name, which only the call carries
    let names: HashMap<&str, &str> = items
        .iter()
        .filter_map(|item| match item {
            InputItem::FunctionCall { call_id, name, .. } => Some((call_id.as_str(), name.as_str())),
            _ => None,
        })
        .collect();

    let mut contents: Vec<(&'static str, Vec<Value>)> = Vec::new();
    for item in items {
        let (role, parts) = match item {
            InputItem::Message(m) => match m.role {
                Role::System | Role::Developer => continue,
                Role::User => ("user", parts_for(&m.content)),
                Role::Assistant => ("model", parts_for(&m.content)),
            },
            InputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => (
                "model",
                vec![json!({"functionCall": {"name": name, "args": parse_arguments(call_id, arguments)?}})],
            ),
            InputItem::FunctionCallOutput { call_id, output } => {
                let name = names
                    .get(call_id.as_str())
                    .ok_or_else(|| TranslationError::MissingToolCallInHistory(call_id.clone()))?;
                let response = match serde_json::from_str::<Value>(output) {
                    Ok(obj @ Value::Object(_)) => obj,
                    Ok(other) => json!({"output": other}),
                    Err(_) => json!({"output": output}),
                };
                (
                    "user",
                    vec![json!({"functionResponse": {"name": name, "response": response}})],
                )
            }
        };
        if parts.is_empty() {
            continue;
        }
        match contents.last_mut() {
            Some((last_role, last_parts)) if *last_role == role => last_parts.extend(parts),
            _ => contents.push((role, parts)),
        }
    }

    Ok(contents
        .into_iter()
        .map(|(role, parts)| json!({"role": role, "parts": parts}))
        .collect())
}

fn tool_config(choice: &ToolChoice) -> Value {
    let config = match choice {
        ToolChoice::Auto => json!({"mode": "AUTO"}),
        ToolChoice::None => json!({"mode": "NONE"}),
        ToolChoice::Required => json!({"mode": "ANY"}),
        ToolChoice::Function(name) => json!({"mode": "ANY", "allowedFunctionNames": [name]}),
    };
    json!({"functionCallingConfig": config})
}

fn usage_from(value: &Value) -> Option<Usage> {
    let meta = value.get("usageMetadata")?;
    Some(Usage::new(
        read_u32(meta, "promptTokenCount"),
        read_u32(meta, "candidatesTokenCount"),
    ))
}

/// Text and function calls from the first candidate
fn read_candidate(value: &Value) -> Result<(String, Vec<ToolCallResult>), TranslationError> {
    let mut text = String::new();
    let mut calls = Vec::new();

    let parts = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array);

    for part in parts.into_iter().flatten() {
        // Thought summaries are not part of the answer
        if part.get("thought").and_then(Value::as_bool) == Some(true) {
            continue;
        }
        if let Some(t) = part.get("text").and_then(Value::as_str) {
            text.push_str(t);
        }
        if let Some(call) = part.get("functionCall") {
            let name = call
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| TranslationError::UnexpectedResponse("functionCall without name".into()))?;
            calls.push(ToolCallResult {
                call_id: call
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(ToolCallResult::generate_id),
                name: name.to_string(),
                arguments: match call.get("args") {
                    Some(Value::Null) | None => "{}".to_string(),
                    Some(args) => args.to_string(),
                },
            });
        }
    }

    Ok((text, calls))
}

impl MessageTranslator for GoogleTranslator {
    fn translate_request(
        &self,
        request: &ResponsesRequest,
        target: &ProviderDescriptor,
    ) -> Result<UpstreamRequest, TranslationError> {
        let items = request.items();

        let mut body = Map::new();
        body.insert("contents".into(), Value::Array(build_contents(&items)?));
        if let Some(system) = system_prompt(request, &items) {
            body.insert("systemInstruction".into(), json!({"parts": [{"text": system}]}));
        }

        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": clean_schema(&t.parameters),
                    })
                })
                .collect();
            body.insert("tools".into(), json!([{"functionDeclarations": declarations}]));
        }
        if let Some(choice) = &request.tool_choice {
            body.insert("toolConfig".into(), tool_config(choice));
        }

        let mut generation = Map::new();
        put_opt(&mut generation, "temperature", request.temperature);
        put_opt(&mut generation, "topP", request.top_p);
        put_opt(&mut generation, "maxOutputTokens", request.max_output_tokens);
        if let Some(effort) = request.reasoning_effort() {
            generation.insert(
                "thinkingConfig".into(),
                json!({"thinkingBudget": effort.thinking_budget()}),
            );
        }
        if !generation.is_empty() {
            body.insert("generationConfig".into(), Value::Object(generation));
        }

        let path = if request.stream {
            format!("/models/{}:streamGenerateContent?alt=sse", target.native_model_id)
        } else {
            format!("/models/{}:generateContent", target.native_model_id)
        };

        Ok(UpstreamRequest {
            path,
            body: Value::Object(body),
            stream: request.stream,
        })
    }

    fn translate_response(&self, response: Value) -> Result<ProviderOutput, TranslationError> {
        if let Some(error) = response.get("error") {
            return Err(TranslationError::UnexpectedResponse(
                error["message"].as_str().unwrap_or("error response").to_string(),
            ));
        }
        if response.get("candidates").and_then(Value::as_array).is_none() {
            let reason = response["promptFeedback"]["blockReason"]
                .as_str()
                .unwrap_or("no candidates");
            return Err(TranslationError::UnexpectedResponse(format!(
                "missing candidates ({})",
                reason
            )));
        }

        let (text, tool_calls) = read_candidate(&response)?;
        Ok(ProviderOutput {
            text,
            tool_calls,
            usage: usage_from(&response),
        })
    }

    fn stream_decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(GeminiStreamDecoder::default())
    }
}

/// Gemini streams complete `GenerateContentResponse` chunks; function calls
/// arrive whole, and the stream simply ends when generation is done.
#[derive(Debug, Default)]
pub struct GeminiStreamDecoder {
    usage: Option<Usage>,
}

impl StreamDecoder for GeminiStreamDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<StreamUpdate>, StreamError> {
        let chunk = parse_event(data)?;
        if let Some(error) = chunk.get("error") {
            return Err(StreamError::ProviderError {
                message: error["message"].as_str().unwrap_or("stream error").to_string(),
                code: error["status"].as_str().map(str::to_string),
            });
        }

        let (text, calls) =
            read_candidate(&chunk).map_err(|e| StreamError::ParseError(e.to_string()))?;
        let mut updates = Vec::new();
        if !text.is_empty() {
            updates.push(StreamUpdate::Text(text));
        }
        updates.extend(calls.into_iter().map(StreamUpdate::ToolCall));

        // Every chunk repeats cumulative usage; keep the latest
        if let Some(usage) = usage_from(&chunk) {
            self.usage = Some(usage);
        }
        Ok(updates)
    }

    fn finish(&mut self) -> Result<Vec<StreamUpdate>, StreamError> {
        let mut updates: Vec<StreamUpdate> = self.usage.take().map(StreamUpdate::Usage).into_iter().collect();
        updates.push(StreamUpdate::Completed);
        Ok(updates)
    }
}
