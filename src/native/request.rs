//! Request types for the Responses API
//!
//! Defines the normalized request every caller sends, regardless of which upstream
//! ends up serving it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::types::{
    validate_tool_name, validate_tool_schema, InputItem, Reasoning, ReasoningEffort, ToolChoice,
    ToolSpec,
};

/// `input` is either a plain prompt or a list of conversation items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Input {
    Text(String),
    Items(Vec<InputItem>),
}

/// Normalized Responses request
///
/// Unknown fields (`store`, `metadata`, ...) are accepted and ignored so
/// stock OpenAI SDKs work unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponsesRequest {
    /// Model alias, resolved through the registry
    pub model: String,
    /// System-level instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub input: Input,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, alias = "max_tokens", skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
}

impl ResponsesRequest {
    /// Conversation as a list of items; a plain-text input becomes one user message
    pub fn items(&self) -> Vec<InputItem> {
        match &self.input {
            Input::Text(text) => vec![InputItem::user_text(text.clone())],
            Input::Items(items) => items.clone(),
        }
    }

    /// Non-empty instructions, if any
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Requested reasoning effort, if any
    pub fn reasoning_effort(&self) -> Option<ReasoningEffort> {
        self.reasoning.as_ref().and_then(|r| r.effort)
    }

    /// Whether the request asks for tool calling in any form
    pub fn uses_tools(&self) -> bool {
        !self.tools.is_empty()
            || matches!(
                self.tool_choice,
                Some(ToolChoice::Required) | Some(ToolChoice::Function(_))
            )
            || matches!(&self.input, Input::Items(items) if items.iter().any(InputItem::is_tool_related))
    }

    /// Structural checks that do not depend on the target provider
    pub fn validate(&self) -> Result<(), String> {
        match &self.input {
            Input::Text(text) if text.is_empty() => return Err("input must not be empty".into()),
            Input::Items(items) if items.is_empty() => {
                return Err("input must contain at least one item".into())
            }
            _ => {}
        }

        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(format!("temperature must be between 0 and 2, got {}", t));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(format!("top_p must be between 0 and 1, got {}", p));
            }
        }
        if self.max_output_tokens == Some(0) {
            return Err("max_output_tokens must be greater than zero".into());
        }

        let mut names = HashSet::new();
        for tool in &self.tools {
            if !validate_tool_name(&tool.name) {
                return Err(format!(
                    "Invalid tool name '{}': use 1-64 letters, digits, '_' or '-'",
                    tool.name
                ));
            }
            if !names.insert(tool.name.as_str()) {
                return Err(format!("Duplicate tool name '{}'", tool.name));
            }
            validate_tool_schema(&tool.parameters)
                .map_err(|e| format!("Tool '{}': {}", tool.name, e))?;
        }

        if let Some(ToolChoice::Function(name)) = &self.tool_choice {
            if !names.contains(name.as_str()) {
                return Err(format!("tool_choice names undeclared tool '{}'", name));
            }
        }

        Ok(())
    }
}
