// src/llm/openai.rs
// OpenAI chat-completions client (non-streaming, single attempt)

use crate::error::{MarketPulseError, Result};
use crate::llm::provider::LlmClient;
use crate::llm::{ChatOutcome, ChatRequest, logging, parse_chat_response};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default request timeout
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
/// Default connect timeout
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// OpenAI API client.
///
/// Performs exactly one HTTP attempt per `chat` call; the analyzer
/// composes [`RetryPolicy`](super::RetryPolicy) and
/// [`EmptyResponseGuard`](super::EmptyResponseGuard) around it.
pub struct OpenAiClient {
    api_key: String,
    api_base: String,
    client: Client,
}

impl OpenAiClient {
    /// Create a client against the default API base with standard timeouts
    pub fn new(api_key: String) -> Self {
        Self::with_base(api_key, DEFAULT_API_BASE.to_string())
    }

    /// Create a client against a custom API base (proxies, test servers)
    pub fn with_base(api_key: String, api_base: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome> {
        let request_id = Uuid::new_v4().to_string();
        let start_time = Instant::now();

        let body = serde_json::to_string(&request)?;
        debug!(
            request_id = %request_id,
            model = %request.model,
            message_count = request.messages.len(),
            "Sending chat request"
        );

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(MarketPulseError::Provider {
                status: status.as_u16(),
                body: error_body,
            });
        }

        let response_body = response.text().await?;
        let duration_ms = start_time.elapsed().as_millis() as u64;

        let outcome = parse_chat_response(&response_body, &request_id, duration_ms)?;

        if let Some(ref usage) = outcome.usage {
            logging::log_usage(&request_id, &request.model, usage);
        }
        logging::log_completion(
            &request_id,
            &request.model,
            duration_ms,
            outcome.content.as_ref().map(|c| c.len()).unwrap_or(0),
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url() {
        let client = OpenAiClient::new("key".into());
        assert_eq!(
            client.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_custom_base_trailing_slash_trimmed() {
        let client = OpenAiClient::with_base("key".into(), "http://localhost:8080/v1/".into());
        assert_eq!(
            client.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_chat_connection_refused_is_transport_error() {
        let client = OpenAiClient::with_base("key".into(), "http://127.0.0.1:1".into());
        let result = client.chat(ChatRequest::new("m", vec![])).await;
        assert!(matches!(result, Err(MarketPulseError::Transport(_))));
    }
}
