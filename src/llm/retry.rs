// src/llm/retry.rs
// Exponential-backoff retry for provider calls

use crate::error::{MarketPulseError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Default maximum retry attempts (on top of the initial attempt)
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay before the first retry
const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
/// Default multiplier applied to the delay after each attempt
const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Retry policy with exponential backoff.
///
/// An operation is attempted `max_retries + 1` times in total; the delay
/// before retry `i` is `initial_delay * backoff_factor^i`. The wrapped
/// operation is treated as idempotent — acceptable here because the
/// remote call is a stateless query.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Worst-case time spent sleeping across a full retry cycle.
    /// Callers use this to budget outer timeouts.
    pub fn max_backoff_total(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut delay = self.initial_delay;
        for _ in 0..self.max_retries {
            total += delay;
            delay = delay.mul_f64(self.backoff_factor);
        }
        total
    }

    /// Run `op` until it succeeds or attempts are exhausted.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.initial_delay;

        for attempt in 0..=self.max_retries {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt == self.max_retries {
                        error!(
                            attempts = self.max_retries + 1,
                            error = %e,
                            "Retries exhausted"
                        );
                        return Err(MarketPulseError::RetriesExhausted {
                            attempts: self.max_retries + 1,
                            last: e.to_string(),
                        });
                    }
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Attempt failed, retrying in {:?}...",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(self.backoff_factor);
                }
            }
        }

        unreachable!("retry loop always returns")
    }
}
