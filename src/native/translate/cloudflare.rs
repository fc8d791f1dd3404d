//! Cloudflare Workers AI translator
//!
//! Text-only: Workers AI text-generation models are driven with plain chat messages
//! and have no tool calling here.

use serde_json::{json, Map, Value};

use super::{
    chat_role, parse_event, put_opt, read_u32, system_prompt, MessageTranslator,
    TranslationError, UpstreamRequest,
};
use crate::native::request::ResponsesRequest;
use crate::native::response::{ProviderOutput, Usage};
use crate::native::streaming::{StreamDecoder, StreamError, StreamUpdate};
use crate::native::types::{InputItem, ToolChoice};
use crate::registry::ProviderDescriptor;

#[derive(Debug, Clone, Default)]
pub struct CloudflareTranslator;

fn usage_from(value: &Value) -> Option<Usage> {
    let usage = value.get("usage").filter(|u| u.is_object())?;
    Some(Usage::new(
        read_u32(usage, "prompt_tokens"),
        read_u32(usage, "completion_tokens"),
    ))
}

impl MessageTranslator for CloudflareTranslator {
    fn translate_request(
        &self,
        request: &ResponsesRequest,
        target: &ProviderDescriptor,
    ) -> Result<UpstreamRequest, TranslationError> {
        let tool_choice_set = matches!(&request.tool_choice, Some(c) if *c != ToolChoice::None);
        if !target.dialect.supports_tools() && (request.uses_tools() || tool_choice_set) {
            return Err(TranslationError::UnsupportedFeature(format!(
                "model '{}' ({}) does not support tool calling",
                request.model, target.dialect
            )));
        }
        if let Some(effort) = request.reasoning_effort() {
            return Err(TranslationError::UnsupportedFeature(format!(
                "model '{}' ({}) does not support reasoning effort '{}'",
                request.model,
                target.dialect,
                effort.as_str()
            )));
        }

        let items = request.items();
        let mut messages = Vec::with_capacity(items.len() + 1);
        if let Some(system) = system_prompt(request, &items) {
            messages.push(json!({"role": "system", "content": system}));
        }
        for item in &items {
            if let InputItem::Message(m) = item {
                if !m.role.is_system() {
                    messages.push(json!({"role": chat_role(m.role), "content": m.content.as_text()}));
                }
            }
        }

        let mut body = Map::new();
        body.insert("messages".into(), Value::Array(messages));
        body.insert("stream".into(), json!(request.stream));
        put_opt(&mut body, "max_tokens", request.max_output_tokens);
        put_opt(&mut body, "temperature", request.temperature);
        put_opt(&mut body, "top_p", request.top_p);

        Ok(UpstreamRequest {
            path: format!("/ai/run/{}", target.native_model_id),
            body: Value::Object(body),
            stream: request.stream,
        })
    }

    fn translate_response(&self, response: Value) -> Result<ProviderOutput, TranslationError> {
        if response.get("success").and_then(Value::as_bool) == Some(false) {
            let message = response["errors"]
                .as_array()
                .and_then(|errors| errors.first())
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("request failed");
            return Err(TranslationError::UnexpectedResponse(message.to_string()));
        }

        let result = response
            .get("result")
            .ok_or_else(|| TranslationError::UnexpectedResponse("missing result".into()))?;
        let text = match result.get("response") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            // JSON-mode models return structured output
            Some(other) => other.to_string(),
        };

        Ok(ProviderOutput {
            text,
            tool_calls: Vec::new(),
            usage: usage_from(result),
        })
    }

    fn stream_decoder(&self) -> Box<dyn StreamDecoder> {
        Box::new(WorkersAiStreamDecoder::default())
    }
}

/// `data: {"response": "..."}` chunks terminated by `data: [DONE]`
#[derive(Debug, Default)]
pub struct WorkersAiStreamDecoder {
    usage: Option<Usage>,
    done: bool,
}

impl WorkersAiStreamDecoder {
    fn complete(&mut self) -> Vec<StreamUpdate> {
        if self.done {
            return Vec::new();
        }
        self.done = true;
        let mut updates: Vec<StreamUpdate> = self.usage.take().map(StreamUpdate::Usage).into_iter().collect();
        updates.push(StreamUpdate::Completed);
        updates
    }
}

impl StreamDecoder for WorkersAiStreamDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<StreamUpdate>, StreamError> {
        if data.trim() == "[DONE]" {
            return Ok(self.complete());
        }

        let chunk = parse_event(data)?;
        if let Some(usage) = usage_from(&chunk) {
            self.usage = Some(usage);
        }
        Ok(chunk
            .get("response")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(|t| vec![StreamUpdate::Text(t.to_string())])
            .unwrap_or_default())
    }

    fn finish(&mut self) -> Result<Vec<StreamUpdate>, StreamError> {
        Ok(self.complete())
    }
}
