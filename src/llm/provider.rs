// src/llm/provider.rs
// Client abstraction over the generative-model provider

use crate::error::Result;
use crate::llm::{ChatOutcome, ChatRequest};
use async_trait::async_trait;

/// Trait for chat-completion clients.
///
/// The pipeline only ever talks to the provider through this seam, so
/// tests substitute a scripted implementation and the analyzer stays
/// network-free.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single chat-completion request. One attempt: retry and
    /// empty-response policies live with the caller.
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome>;
}
