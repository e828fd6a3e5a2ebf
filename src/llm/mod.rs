// src/llm/mod.rs
// Provider wire boundary: chat messages, token accounting, retry policies

mod compat;
mod guard;
mod logging;
mod openai;
mod openai_compat;
mod provider;
mod retry;
mod tokens;

pub use compat::supports_json_response_format;
pub use guard::EmptyResponseGuard;
pub use openai::OpenAiClient;
pub use openai_compat::{ChatOutcome, ChatRequest, ResponseFormat, Usage, parse_chat_response};
pub use provider::LlmClient;
pub use retry::RetryPolicy;
pub use tokens::TokenCounter;

use serde::{Deserialize, Serialize};

/// One chat message in the provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            name: None,
        }
    }
}
