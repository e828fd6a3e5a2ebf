// src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use tracing::{debug, warn};

/// API keys loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// OpenAI API key (OPENAI_API_KEY)
    pub openai: Option<String>,
}

impl ApiKeys {
    /// Load API keys from environment variables (single source of truth)
    pub fn from_env() -> Self {
        let keys = Self {
            openai: read_key("OPENAI_API_KEY"),
        };
        keys.log_status();
        keys
    }

    /// Check if a provider is available
    pub fn has_provider(&self) -> bool {
        self.openai.is_some()
    }

    /// Log which API keys are available (without exposing values)
    fn log_status(&self) {
        if self.openai.is_some() {
            debug!(keys = ?["OpenAI"], "API keys loaded");
        } else {
            warn!("No API keys configured - analysis calls will be unavailable");
        }
    }
}

/// Env-var overrides for the provider endpoint and model selection
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// OPENAI_BASE_URL, default https://api.openai.com/v1
    pub api_base: String,
    /// MARKETPULSE_BATCH_MODEL
    pub batch_model: Option<String>,
    /// MARKETPULSE_SYNTHESIS_MODEL
    pub synthesis_model: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            batch_model: read_key("MARKETPULSE_BATCH_MODEL"),
            synthesis_model: read_key("MARKETPULSE_SYNTHESIS_MODEL"),
        }
    }
}

/// Read a single env var, filtering empty values
fn read_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|k| !k.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_api_keys_empty() {
        let keys = ApiKeys::default();
        assert!(!keys.has_provider());
    }

    #[test]
    fn test_has_provider_with_key() {
        let keys = ApiKeys {
            openai: Some("sk-test".into()),
        };
        assert!(keys.has_provider());
    }
}
