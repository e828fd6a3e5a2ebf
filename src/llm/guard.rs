// src/llm/guard.rs
// Blank-response detection and fixed-delay retry around provider calls

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Default total attempts before giving up on a blank response
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default fixed pause between attempts
const DEFAULT_DELAY_MS: u64 = 2_000;

/// Guard that treats null/whitespace-only model output as a transient
/// failure of its own class.
///
/// The delay is fixed, not exponential: blank completions are a model
/// hiccup, not a backpressure signal, so the escalating-delay policy of
/// [`RetryPolicy`](super::RetryPolicy) does not apply.
#[derive(Debug, Clone)]
pub struct EmptyResponseGuard {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for EmptyResponseGuard {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }
}

impl EmptyResponseGuard {
    /// Run `op` until it yields non-blank content, up to `max_retries`
    /// total attempts. Errors from `op` count as failed attempts. On
    /// exhaustion returns None; the caller substitutes the analysis
    /// kind's default payload.
    pub async fn call_with_guard<F, Fut>(&self, mut op: F) -> Option<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<String>>>,
    {
        for attempt in 1..=self.max_retries {
            match op().await {
                Ok(Some(content)) if !content.trim().is_empty() => return Some(content),
                Ok(_) => {
                    warn!(attempt, "Provider returned blank content");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Provider call failed inside empty-response guard");
                }
            }

            if attempt < self.max_retries {
                info!("Retrying provider call in {:?}...", self.delay);
                tokio::time::sleep(self.delay).await;
            }
        }

        warn!(
            max_retries = self.max_retries,
            "Empty-response guard exhausted"
        );
        None
    }
}
