// src/error.rs
// Standardized error types for marketpulse

use thiserror::Error;

/// Main error type for the marketpulse library
#[derive(Error, Debug)]
pub enum MarketPulseError {
    /// Non-2xx response from the provider API
    #[error("provider error {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider returned a response with no usable content
    #[error("empty response from provider")]
    EmptyResponse,

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown error: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using MarketPulseError
pub type Result<T> = std::result::Result<T, MarketPulseError>;

impl MarketPulseError {
    /// Whether the failure is worth retrying.
    ///
    /// Rate limits and 5xx are transient; connect/timeout transport
    /// failures are safe to retry because the provider call is a
    /// stateless query. An empty response is handled by its own guard
    /// with a distinct policy and is deliberately not counted here.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Transport(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

impl From<String> for MarketPulseError {
    fn from(s: String) -> Self {
        MarketPulseError::Other(s)
    }
}
