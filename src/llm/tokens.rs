// src/llm/tokens.rs
// Token accounting against the target model's tokenizer

use super::Message;
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Fixed per-message overhead in the chat-completions accounting.
pub const MESSAGE_TOKEN_OVERHEAD: usize = 4;
/// Extra token charged when a message carries a `name` field.
pub const NAME_TOKEN_OVERHEAD: usize = 1;
/// Tokens the API reserves to prime the assistant reply.
pub const REPLY_PRIMING_TOKENS: usize = 2;

/// Token counter bound to one model's tokenizer.
///
/// Falls back to the generic cl100k_base encoding when the model has no
/// registered tokenizer, and to a ~4-chars-per-token estimate if no
/// encoding can be constructed at all. Pure: no side effects, same
/// input always yields the same count.
pub struct TokenCounter {
    bpe: Option<CoreBPE>,
    model: String,
}

impl TokenCounter {
    pub fn new(model: &str) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .or_else(|_| {
                debug!(model = model, "No model tokenizer, using cl100k_base");
                tiktoken_rs::cl100k_base()
            })
            .ok();
        Self {
            bpe,
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Count tokens in a text fragment.
    pub fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            // ~4 characters per token, rounded up
            None => text.len().div_ceil(4),
        }
    }

    /// Count tokens for a full message list the way the provider bills
    /// them: per-message overhead, name surcharge, reply priming.
    pub fn count_message_tokens(&self, messages: &[Message]) -> usize {
        let mut total = 0;
        for message in messages {
            total += MESSAGE_TOKEN_OVERHEAD;
            total += self.count_tokens(&message.role);
            total += self.count_tokens(&message.content);
            if let Some(name) = &message.name {
                total += self.count_tokens(name) + NAME_TOKEN_OVERHEAD;
            }
        }
        total + REPLY_PRIMING_TOKENS
    }
}
