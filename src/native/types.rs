//! Core conversation types for the Responses API
//!
//! Roles, message content, input items and tool definitions as callers send them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Role of a message participant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    /// Newer OpenAI clients send this in place of `system`
    Developer,
    User,
    Assistant,
}

impl Role {
    pub fn is_system(&self) -> bool {
        matches!(self, Role::System | Role::Developer)
    }
}

/// A part of multi-part message content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    #[serde(alias = "text")]
    InputText { text: String },
    OutputText { text: String },
    InputImage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_url: Option<Value>,
    },
    /// Part types the proxy does not translate (files, audio, ...)
    #[serde(other)]
    Unsupported,
}

/// Message content - either plain text or a list of parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Extract text content from either variant
    ///
    /// For `Parts`, text parts are concatenated and everything else is skipped.
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::InputText { text } | ContentPart::OutputText { text } => {
                        Some(text.as_str())
                    }
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    pub fn has_images(&self) -> bool {
        matches!(self, Content::Parts(parts) if parts.iter().any(|p| matches!(p, ContentPart::InputImage { .. })))
    }
}

/// A conversation message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageItem {
    pub role: Role,
    pub content: Content,
}

/// One entry of a Responses `input` list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", from = "InputItemWire")]
pub enum InputItem {
    Message(MessageItem),
    /// A tool call the assistant made earlier in the conversation
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    /// The caller's result for an earlier tool call
    FunctionCallOutput { call_id: String, output: String },
}

impl InputItem {
    pub fn user_text(text: impl Into<String>) -> Self {
        InputItem::Message(MessageItem {
            role: Role::User,
            content: Content::Text(text.into()),
        })
    }

    pub fn is_tool_related(&self) -> bool {
        matches!(
            self,
            InputItem::FunctionCall { .. } | InputItem::FunctionCallOutput { .. }
        )
    }
}

/// Items carry a `type` tag, except plain messages which may omit it
#[derive(Deserialize)]
#[serde(untagged)]
enum InputItemWire {
    Typed(TypedInputItem),
    Bare(MessageItem),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TypedInputItem {
    Message(MessageItem),
    FunctionCall {
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        #[serde(deserialize_with = "string_or_json")]
        output: String,
    },
}

impl From<InputItemWire> for InputItem {
    fn from(wire: InputItemWire) -> Self {
        match wire {
            InputItemWire::Bare(message) => InputItem::Message(message),
            InputItemWire::Typed(TypedInputItem::Message(message)) => InputItem::Message(message),
            InputItemWire::Typed(TypedInputItem::FunctionCall {
                call_id,
                name,
                arguments,
            }) => InputItem::FunctionCall {
                call_id,
                name,
                arguments,
            },
            InputItemWire::Typed(TypedInputItem::FunctionCallOutput { call_id, output }) => {
                InputItem::FunctionCallOutput { call_id, output }
            }
        }
    }
}

/// Tool outputs are strings, but some clients send JSON values directly
fn string_or_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

// =============================================================================
// Tool Calling Types
// =============================================================================

/// Tool names: alphanumeric, underscore and hyphen, at most 64 characters
static TOOL_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").expect("tool name pattern is valid"));

pub fn validate_tool_name(name: &str) -> bool {
    TOOL_NAME_PATTERN.is_match(name)
}

/// Validate a JSON Schema for tool parameters
///
/// The schema must have `type: "object"` and compile under draft 2020-12.
pub fn validate_tool_schema(schema: &Value) -> Result<(), String> {
    match schema.get("type") {
        Some(Value::String(t)) if t == "object" => {}
        Some(Value::String(t)) => {
            return Err(format!(
                "Tool parameters schema must have type 'object', got '{}'",
                t
            ));
        }
        Some(_) => {
            return Err("Tool parameters schema 'type' must be a string".to_string());
        }
        None => {
            return Err("Tool parameters schema must have 'type' field".to_string());
        }
    }

    jsonschema::draft202012::new(schema).map_err(|e| format!("Invalid JSON Schema: {}", e))?;

    Ok(())
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// A function the model may call
///
/// Serialized in the flat Responses form. Deserialization also accepts the
/// nested Chat Completions form `{type, function: {name, ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ToolWire")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ToolWire {
    Nested {
        #[serde(rename = "type")]
        tool_type: String,
        function: FunctionWire,
    },
    Flat {
        #[serde(rename = "type", default = "function_type")]
        tool_type: String,
        #[serde(flatten)]
        function: FunctionWire,
    },
}

#[derive(Deserialize)]
struct FunctionWire {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<Value>,
}

fn function_type() -> String {
    "function".to_string()
}

impl TryFrom<ToolWire> for ToolSpec {
    type Error = String;

    fn try_from(wire: ToolWire) -> Result<Self, Self::Error> {
        let (tool_type, function) = match wire {
            ToolWire::Nested { tool_type, function } | ToolWire::Flat { tool_type, function } => {
                (tool_type, function)
            }
        };
        if tool_type != "function" {
            return Err(format!("unsupported tool type '{}'", tool_type));
        }

        Ok(ToolSpec {
            name: function.name,
            description: function.description.unwrap_or_default(),
            parameters: match function.parameters {
                Some(Value::Null) | None => empty_object_schema(),
                Some(schema) => schema,
            },
        })
    }
}

/// Which tools the model may call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function(String),
}

impl Serialize for ToolChoice {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ToolChoice::Auto => serializer.serialize_str("auto"),
            ToolChoice::None => serializer.serialize_str("none"),
            ToolChoice::Required => serializer.serialize_str("required"),
            ToolChoice::Function(name) => {
                json!({"type": "function", "name": name}).serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for ToolChoice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        match Value::deserialize(deserializer)? {
            Value::String(mode) => match mode.as_str() {
                "auto" => Ok(ToolChoice::Auto),
                "none" => Ok(ToolChoice::None),
                "required" | "any" => Ok(ToolChoice::Required),
                other => Err(D::Error::custom(format!("unknown tool_choice '{}'", other))),
            },
            Value::Object(obj) => {
                let name = obj
                    .get("name")
                    .or_else(|| obj.get("function").and_then(|f| f.get("name")))
                    .and_then(Value::as_str)
                    .ok_or_else(|| D::Error::custom("tool_choice object must name a function"))?;
                Ok(ToolChoice::Function(name.to_string()))
            }
            _ => Err(D::Error::custom("tool_choice must be a string or object")),
        }
    }
}

// =============================================================================
// Reasoning
// =============================================================================

/// How much effort a reasoning model should spend before answering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }

    /// Thinking token budget for upstreams that take a budget instead of a level
    ///
    /// Anthropic requires at least 1024; Gemini Flash caps at 24576.
    pub fn thinking_budget(&self) -> u32 {
        match self {
            ReasoningEffort::Minimal => 1024,
            ReasoningEffort::Low => 2048,
            ReasoningEffort::Medium => 8192,
            ReasoningEffort::High => 24576,
        }
    }
}

/// Responses `reasoning` object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reasoning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<ReasoningEffort>,
}
