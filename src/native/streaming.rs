//! Streaming normalization
//!
//! Turns an upstream SSE byte stream into [`NormalizedEvent`]s. Dialect decoders
//! interpret individual `data:` payloads; [`ResponseNormalizer`] owns line
//! reassembly and the terminal-event guarantee shared by every dialect.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

use super::response::{NormalizedEvent, ToolCallResult, Usage};
use crate::error::AppError;
use crate::streaming::{data_payload, SseLineBuffer};

/// What a dialect decoder extracted from one upstream event
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Text(String),
    ToolCall(ToolCallResult),
    Usage(Usage),
    /// The upstream signalled a normal end of generation
    Completed,
}

/// Per-call, per-dialect interpreter of SSE `data:` payloads
pub trait StreamDecoder: Send {
    /// Decode one `data:` payload
    fn decode(&mut self, data: &str) -> Result<Vec<StreamUpdate>, StreamError>;

    /// Called once when the upstream body ends.
    ///
    /// Returns `Completed` (after flushing pending tool calls) when ending here is a
    /// normal finish for the dialect, or `ConnectionClosed` otherwise.
    fn finish(&mut self) -> Result<Vec<StreamUpdate>, StreamError>;
}

// ============================================================================
// Stream Errors
// ============================================================================

/// Errors that can occur during stream processing.
#[derive(Debug, Error, PartialEq)]
pub enum StreamError {
    /// Failed to parse a chunk from the provider
    #[error("Failed to parse provider chunk: {0}")]
    ParseError(String),

    /// Stream connection closed unexpectedly
    #[error("Stream connection closed unexpectedly")]
    ConnectionClosed,

    /// Provider returned an error in the stream
    #[error("Provider error: {message}")]
    ProviderError {
        message: String,
        code: Option<String>,
    },
}

impl StreamError {
    pub fn into_app_error(self, provider: &str) -> AppError {
        match self {
            StreamError::ParseError(message) => AppError::MalformedUpstreamResponse {
                provider: provider.to_string(),
                message,
            },
            StreamError::ConnectionClosed => AppError::UpstreamUnreachable {
                provider: provider.to_string(),
                message: "stream ended before completion".to_string(),
            },
            StreamError::ProviderError { message, code } => AppError::UpstreamError {
                provider: provider.to_string(),
                // Errors reported inside a 200 stream have no HTTP status of their own
                status: 502,
                body: match code {
                    Some(code) => format!("{}: {}", code, message),
                    None => message,
                },
            },
        }
    }
}

/// Format an event as an SSE data frame: `data: {json}\n\n`
pub fn format_sse_event(event: &NormalizedEvent) -> Bytes {
    match serde_json::to_string(event) {
        Ok(json) => Bytes::from(format!("data: {}\n\n", json)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize stream event");
            Bytes::from_static(
                b"data: {\"delta_text\":null,\"tool_call_delta\":null,\"done\":true,\"error\":{\"code\":\"internal_error\",\"message\":\"Internal server error\"}}\n\n",
            )
        }
    }
}

// ============================================================================
// Tool Call Accumulator
// ============================================================================

#[derive(Debug, Default)]
struct AccumulatedToolCall {
    id: Option<String>,
    function_name: String,
    arguments: String,
}

/// Accumulates tool call fragments across streaming chunks.
///
/// Upstreams send a call's id and name first and its arguments in pieces, keyed by
/// an index identifying the call within a parallel set. Calls leave the
/// accumulator only as complete [`ToolCallResult`]s whose arguments parse as JSON.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    tool_calls: HashMap<u32, AccumulatedToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the start of a call, or update its id/name
    pub fn begin(&mut self, index: u32, id: Option<&str>, name: Option<&str>) {
        let entry = self.tool_calls.entry(index).or_default();
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            entry.id = Some(id.to_string());
        }
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            entry.function_name = name.to_string();
        }
    }

    /// Append an argument fragment
    pub fn push_arguments(&mut self, index: u32, fragment: &str) {
        self.tool_calls
            .entry(index)
            .or_default()
            .arguments
            .push_str(fragment);
    }

    /// Replace the accumulated arguments with the upstream's final value
    pub fn set_arguments(&mut self, index: u32, arguments: &str) {
        self.tool_calls.entry(index).or_default().arguments = arguments.to_string();
    }

    /// Id recorded so far for the call at `index`
    pub fn call_id(&self, index: u32) -> Option<&str> {
        self.tool_calls.get(&index).and_then(|c| c.id.as_deref())
    }

    pub fn contains(&self, index: u32) -> bool {
        self.tool_calls.contains_key(&index)
    }

    /// Complete and remove the call at `index`.
    ///
    /// Empty arguments become `{}`. Arguments that are not valid JSON fail.
    pub fn finalize_index(&mut self, index: u32) -> Result<Option<ToolCallResult>, StreamError> {
        match self.tool_calls.remove(&index) {
            Some(acc) => finalize_one(index, acc).map(Some),
            None => Ok(None),
        }
    }

    /// Complete every pending call, ordered by index
    pub fn finalize_all(&mut self) -> Result<Vec<ToolCallResult>, StreamError> {
        let mut entries: Vec<_> = self.tool_calls.drain().collect();
        entries.sort_by_key(|(idx, _)| *idx);

        entries
            .into_iter()
            .map(|(index, acc)| finalize_one(index, acc))
            .collect()
    }
}

fn finalize_one(index: u32, acc: AccumulatedToolCall) -> Result<ToolCallResult, StreamError> {
    if acc.function_name.is_empty() {
        return Err(StreamError::ParseError(format!(
            "Tool call at index {} missing function name",
            index
        )));
    }

    let arguments = if acc.arguments.trim().is_empty() {
        "{}".to_string()
    } else {
        serde_json::from_str::<serde_json::Value>(&acc.arguments).map_err(|e| {
            StreamError::ParseError(format!(
                "Malformed tool arguments at index {}: {}",
                index, e
            ))
        })?;
        acc.arguments
    };

    Ok(ToolCallResult {
        call_id: acc.id.unwrap_or_else(ToolCallResult::generate_id),
        name: acc.function_name,
        arguments,
    })
}

// ============================================================================
// Response Normalizer
// ============================================================================

/// Per-call stream state: SSE reassembly, a dialect decoder, and the
/// exactly-one-terminal-event guarantee.
pub struct ResponseNormalizer {
    provider: &'static str,
    lines: SseLineBuffer,
    decoder: Box<dyn StreamDecoder>,
    usage: Option<Usage>,
    finished: bool,
}

impl ResponseNormalizer {
    pub fn new(provider: &'static str, decoder: Box<dyn StreamDecoder>) -> Self {
        Self {
            provider,
            lines: SseLineBuffer::new(),
            decoder,
            usage: None,
            finished: false,
        }
    }

    /// True once the terminal event has been produced
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one network chunk
    pub fn push(&mut self, chunk: &[u8]) -> Vec<NormalizedEvent> {
        if self.finished {
            return Vec::new();
        }
        let lines = match self.lines.feed(chunk) {
            Ok(lines) => lines,
            Err(e) => {
                return self
                    .fail_with(StreamError::ParseError(e.to_string()))
                    .into_iter()
                    .collect()
            }
        };
        let mut events = Vec::new();
        for line in lines {
            self.process_line(&line, &mut events);
            if self.finished {
                break;
            }
        }
        events
    }

    /// The upstream body ended
    pub fn end_of_input(&mut self) -> Vec<NormalizedEvent> {
        if self.finished {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(line) = self.lines.take_remaining() {
            self.process_line(&line, &mut events);
        }
        if self.finished {
            return events;
        }

        match self.decoder.finish() {
            Ok(updates) => self.apply(updates, &mut events),
            Err(e) => events.extend(self.fail_with(e)),
        }
        if !self.finished {
            events.extend(self.fail_with(StreamError::ConnectionClosed));
        }
        events
    }

    /// Terminate with an error, unless the stream already ended
    pub fn fail(&mut self, err: &AppError) -> Option<NormalizedEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        Some(NormalizedEvent::failed(err))
    }

    fn fail_with(&mut self, err: StreamError) -> Option<NormalizedEvent> {
        warn!(provider = self.provider, error = %err, "Upstream stream failed");
        let app_err = err.into_app_error(self.provider);
        self.fail(&app_err)
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<NormalizedEvent>) {
        let Some(data) = data_payload(line) else {
            return;
        };
        if data.trim().is_empty() {
            return;
        }
        match self.decoder.decode(data) {
            Ok(updates) => self.apply(updates, events),
            Err(e) => events.extend(self.fail_with(e)),
        }
    }

    fn apply(&mut self, updates: Vec<StreamUpdate>, events: &mut Vec<NormalizedEvent>) {
        for update in updates {
            if self.finished {
                return;
            }
            match update {
                StreamUpdate::Text(text) => {
                    if !text.is_empty() {
                        events.push(NormalizedEvent::text(text));
                    }
                }
                StreamUpdate::ToolCall(call) => {
                    debug!(provider = self.provider, tool = %call.name, "Tool call complete");
                    events.push(NormalizedEvent::tool_call(call));
                }
                StreamUpdate::Usage(usage) => self.usage = Some(usage),
                StreamUpdate::Completed => {
                    self.finished = true;
                    events.push(NormalizedEvent::completed(self.usage.take()));
                }
            }
        }
    }
}
