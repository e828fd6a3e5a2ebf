// src/llm/logging.rs
// Shared logging helpers for provider calls

use super::Usage;
use tracing::info;

/// Log usage statistics for a provider call.
pub fn log_usage(request_id: &str, model: &str, usage: &Usage) {
    info!(
        request_id = %request_id,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        "{} usage stats", model
    );
}

/// Log completion summary for a provider call.
pub fn log_completion(request_id: &str, model: &str, duration_ms: u64, content_len: usize) {
    info!(
        request_id = %request_id,
        duration_ms = duration_ms,
        content_len = content_len,
        "{} chat complete", model
    );
}
