//! Mock upstream providers
//!
//! One wiremock server per wire dialect. Each mock mounts the endpoint the
//! proxy calls for that dialect and asserts the provider credential is sent the
//! way the dialect expects:
//! - OpenAI Chat Completions compatible services (`Authorization: Bearer`)
//! - Anthropic Messages (`x-api-key` + `anthropic-version`)
//! - Gemini generateContent (`x-goog-api-key`)

pub mod anthropic;
pub mod google;
pub mod openai_chat;

pub use anthropic::*;
pub use google::*;
pub use openai_chat::*;

/// Render SSE `data:` frames the way upstreams write them
pub fn sse_body<I, S>(payloads: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    payloads
        .into_iter()
        .map(|p| format!("data: {}\n\n", p.as_ref()))
        .collect()
}
