// src/config/file.rs
// File-based configuration from ~/.marketpulse/config.toml

use crate::analysis::AnalysisBudgets;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Top-level config structure
#[derive(Debug, Deserialize, Default)]
pub struct MarketPulseConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub budgets: BudgetsSection,
}

/// LLM configuration section
#[derive(Debug, Deserialize, Default)]
pub struct LlmSection {
    /// Model for per-batch analysis
    pub batch_model: Option<String>,
    /// Model for the final synthesis
    pub synthesis_model: Option<String>,
    pub temperature: Option<f32>,
}

/// Token-budget overrides
#[derive(Debug, Deserialize, Default)]
pub struct BudgetsSection {
    pub batch_token_budget: Option<usize>,
    pub batch_call_ceiling: Option<usize>,
    pub synthesis_call_ceiling: Option<usize>,
    pub max_batches: Option<usize>,
}

impl MarketPulseConfig {
    /// Load config from ~/.marketpulse/config.toml
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path, defaulting on any failure
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
        }
    }

    /// Get the config file path
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".marketpulse")
            .join("config.toml")
    }

    /// Apply budget overrides onto the defaults
    pub fn budgets(&self) -> AnalysisBudgets {
        let mut budgets = AnalysisBudgets::default();
        if let Some(v) = self.budgets.batch_token_budget {
            budgets.batch_token_budget = v;
        }
        if let Some(v) = self.budgets.batch_call_ceiling {
            budgets.batch_call_ceiling = v;
        }
        if let Some(v) = self.budgets.synthesis_call_ceiling {
            budgets.synthesis_call_ceiling = v;
        }
        if let Some(v) = self.budgets.max_batches {
            budgets.max_batches = v;
        }
        budgets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[llm]
batch_model = "gpt-4o-mini"
synthesis_model = "gpt-4o"

[budgets]
max_batches = 5
"#;
        let config: MarketPulseConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.batch_model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.budgets().max_batches, 5);
        // Untouched budgets keep their defaults
        assert_eq!(config.budgets().batch_call_ceiling, 3_500);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: MarketPulseConfig = toml::from_str("").unwrap();
        assert!(config.llm.batch_model.is_none());
        assert_eq!(config.budgets(), AnalysisBudgets::default());
    }

    #[test]
    fn test_load_from_missing_file_defaults() {
        let config = MarketPulseConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(config.llm.synthesis_model.is_none());
    }

    #[test]
    fn test_load_from_garbage_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not [valid toml").unwrap();
        let config = MarketPulseConfig::load_from(&path);
        assert!(config.llm.batch_model.is_none());
    }

    #[test]
    fn test_load_from_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\ntemperature = 0.2\n").unwrap();
        let config = MarketPulseConfig::load_from(&path);
        assert_eq!(config.llm.temperature, Some(0.2));
    }
}
