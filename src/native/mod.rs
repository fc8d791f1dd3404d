//! Native API types for the worker proxy
//!
//! This module defines the Responses-style format every caller speaks, and the
//! translation layer that maps it onto each upstream dialect and back.

pub mod request;
pub mod response;
pub mod streaming;
pub mod translate;
pub mod types;

// Re-export key types for convenience
pub use request::{Input, ResponsesRequest};
pub use response::{
    EventError, NormalizedEvent, NormalizedResponse, OutputItem, ProviderOutput, ToolCallResult,
    Usage,
};
pub use streaming::{ResponseNormalizer, StreamDecoder, StreamError, StreamUpdate};
pub use translate::{translator_for, MessageTranslator, TranslationError, UpstreamRequest};
pub use types::{
    Content, ContentPart, InputItem, MessageItem, Reasoning, ReasoningEffort, Role, ToolChoice,
    ToolSpec,
};
