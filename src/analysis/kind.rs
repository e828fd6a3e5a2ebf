// src/analysis/kind.rs
// Analysis kinds: one place mapping each kind to its prompt role and
// its degraded-mode default response

use super::result::{AnalysisResult, Period};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller wants out of the run. Each kind carries its own
/// system-prompt role and its own schema-complete default payload for
/// when every provider-side recovery has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Trends,
    Competitors,
    Metrics,
}

impl AnalysisKind {
    /// Parse kind from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trends" => Some(Self::Trends),
            "competitors" => Some(Self::Competitors),
            "metrics" => Some(Self::Metrics),
            _ => None,
        }
    }

    /// Role paragraph injected into the system prompt for this kind
    pub fn role_instructions(&self) -> &'static str {
        match self {
            Self::Trends => {
                "Your task is to analyze trends and metric dynamics. Surface patterns, \
                 trends and anomalies in the data, and recommend ways to improve the metrics."
            }
            Self::Competitors => {
                "Your task is to analyze competitors and their metrics. Identify competitor \
                 strengths and weaknesses, and recommend ways to improve competitiveness."
            }
            Self::Metrics => {
                "Your task is to analyze metrics and indicators. Surface patterns, trends \
                 and anomalies in the data, and recommend ways to improve the metrics."
            }
        }
    }

    fn default_title(&self) -> &'static str {
        match self {
            Self::Trends => "Trend analysis",
            Self::Competitors => "Competitor analysis",
            Self::Metrics => "Data analysis",
        }
    }

    fn attempted_task(&self) -> &'static str {
        match self {
            Self::Trends => "Attempted trend analysis",
            Self::Competitors => "Attempted competitor analysis",
            Self::Metrics => "Attempted data analysis",
        }
    }

    /// Schema-complete placeholder returned when the provider could not
    /// be made to answer. Content-poor by design; the shape contract
    /// still holds.
    pub fn default_response(&self) -> AnalysisResult {
        AnalysisResult {
            title: self.default_title().into(),
            summary: format!(
                "{} could not be completed because of a provider error. \
                 Please retry later or contact support.",
                self.default_title()
            ),
            period: Period::today(),
            factors: super::result::Factors {
                missing_values: "Missing-value information is unavailable".into(),
                categorical_data: "Categorical-data information is unavailable".into(),
                key_factors: vec!["Not enough data for analysis".into()],
            },
            completed_tasks: vec![self.attempted_task().into()],
            pending_tasks: vec![
                "Retry the analysis later".into(),
                "Check the quality of the source data".into(),
                "Contact support if the error persists".into(),
            ],
            ..AnalysisResult::default()
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trends => write!(f, "trends"),
            Self::Competitors => write!(f, "competitors"),
            Self::Metrics => write!(f, "metrics"),
        }
    }
}
