// src/config/mod.rs
// Configuration: env vars, optional config file, composed service config

pub mod env;
pub mod file;

pub use env::{ApiKeys, EnvConfig};
pub use file::MarketPulseConfig;

use crate::analysis::AnalysisBudgets;
use crate::llm::{EmptyResponseGuard, RetryPolicy};

/// Default model for per-batch analysis (the cheap stage)
const DEFAULT_BATCH_MODEL: &str = "gpt-4o-mini";
/// Default model for final synthesis (the expensive stage)
const DEFAULT_SYNTHESIS_MODEL: &str = "gpt-4o";
/// Default sampling temperature for both stages
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Everything an [`AnalysisService`](crate::analysis::AnalysisService)
/// needs, built once at process start. Read-only after construction.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub batch_model: String,
    pub synthesis_model: String,
    pub temperature: f32,
    pub budgets: AnalysisBudgets,
    pub retry: RetryPolicy,
    pub guard: EmptyResponseGuard,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".into(),
            batch_model: DEFAULT_BATCH_MODEL.into(),
            synthesis_model: DEFAULT_SYNTHESIS_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            budgets: AnalysisBudgets::default(),
            retry: RetryPolicy::default(),
            guard: EmptyResponseGuard::default(),
        }
    }
}

impl ServiceConfig {
    /// Compose configuration from env vars and the optional config file.
    /// Precedence: env var, then config file, then built-in default.
    pub fn from_env() -> Self {
        // Pick up a local .env if present; ignored when absent
        let _ = dotenvy::dotenv();

        let api_keys = ApiKeys::from_env();
        let env = EnvConfig::from_env();
        let file = MarketPulseConfig::load();

        Self {
            api_key: api_keys.openai,
            api_base: env.api_base,
            batch_model: env
                .batch_model
                .or(file.llm.batch_model.clone())
                .unwrap_or_else(|| DEFAULT_BATCH_MODEL.into()),
            synthesis_model: env
                .synthesis_model
                .or(file.llm.synthesis_model.clone())
                .unwrap_or_else(|| DEFAULT_SYNTHESIS_MODEL.into()),
            temperature: file.llm.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            budgets: file.budgets(),
            retry: RetryPolicy::default(),
            guard: EmptyResponseGuard::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.batch_model, "gpt-4o-mini");
        assert_eq!(config.synthesis_model, "gpt-4o");
        assert_eq!(config.budgets, AnalysisBudgets::default());
    }

    #[test]
    fn test_default_models_accept_json_format() {
        // Both default models must be on the structured-output allow-list,
        // otherwise every call silently loses response_format
        let config = ServiceConfig::default();
        assert!(crate::llm::supports_json_response_format(&config.batch_model));
        assert!(crate::llm::supports_json_response_format(&config.synthesis_model));
    }
}
