// src/llm/openai_compat/response.rs
// Chat-completions response parsing

use crate::error::Result;
use serde::Deserialize;

/// Token usage as reported by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Non-streaming chat response (OpenAI-compatible format)
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Outcome of one provider call. Only the first choice's content is
/// consumed; everything else in the wire response is provider noise.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub request_id: String,
    pub content: Option<String>,
    pub usage: Option<Usage>,
    pub duration_ms: u64,
}

/// Parse a chat-completions response body into a ChatOutcome
pub fn parse_chat_response(
    response_body: &str,
    request_id: &str,
    duration_ms: u64,
) -> Result<ChatOutcome> {
    let data: ChatResponse = serde_json::from_str(response_body)?;

    let content = data
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content);

    Ok(ChatOutcome {
        request_id: request_id.to_owned(),
        content,
        usage: data.usage,
        duration_ms,
    })
}
