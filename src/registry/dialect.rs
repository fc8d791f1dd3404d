use serde::{Deserialize, Serialize};

use crate::native::translate::{translator_for, MessageTranslator};

/// Wire dialect spoken by an upstream provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// OpenAI Responses API
    #[serde(rename = "openai")]
    OpenAi,
    /// Chat Completions compatible services (NVIDIA NIM, Groq, DeepSeek, Zhipu, ...)
    #[serde(rename = "openai-chat", alias = "openai-compatible")]
    OpenAiChat,
    /// Anthropic Messages API
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Gemini generateContent API
    #[serde(rename = "google")]
    Google,
    /// Workers AI text generation
    #[serde(rename = "cloudflare-ai")]
    CloudflareAi,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::OpenAi => "openai",
            Dialect::OpenAiChat => "openai-chat",
            Dialect::Anthropic => "anthropic",
            Dialect::Google => "google",
            Dialect::CloudflareAi => "cloudflare-ai",
        }
    }

    /// Endpoint base used when a route does not set `base_url`
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Dialect::OpenAi | Dialect::OpenAiChat => Some("https://api.openai.com/v1"),
            Dialect::Anthropic => Some("https://api.anthropic.com/v1"),
            Dialect::Google => Some("https://generativelanguage.googleapis.com/v1beta"),
            // Needs an account id in the path
            Dialect::CloudflareAi => None,
        }
    }

    pub fn default_auth(&self) -> AuthMode {
        match self {
            Dialect::Anthropic => AuthMode::XApiKey,
            Dialect::Google => AuthMode::GoogApiKey,
            _ => AuthMode::Bearer,
        }
    }

    /// Whether the upstream can receive tool definitions and tool-call history
    pub fn supports_tools(&self) -> bool {
        !matches!(self, Dialect::CloudflareAi)
    }

    /// The dialect's request/response translator
    pub fn translator(&self) -> &'static dyn MessageTranslator {
        translator_for(*self)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the provider API key is presented upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-api-key: <key>` plus `anthropic-version`
    XApiKey,
    /// `x-goog-api-key: <key>`
    #[serde(rename = "x-goog-api-key")]
    GoogApiKey,
    None,
}
