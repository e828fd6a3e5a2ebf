// src/analysis/result.rs
// The structured analysis contract and its lenient coercion from model JSON

use crate::repair::{extract_bullets, period_dates};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reporting period, dates formatted "DD.MM".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Period {
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

impl Default for Period {
    fn default() -> Self {
        Self {
            start_date: "01.01".into(),
            end_date: "31.12".into(),
        }
    }
}

impl Period {
    /// Degenerate single-day period anchored at today.
    pub fn today() -> Self {
        let today = Local::now().format("%d.%m").to_string();
        Self {
            start_date: today.clone(),
            end_date: today,
        }
    }
}

/// Headline movement of the analyzed metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Dynamics {
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub total_columns: u64,
    #[serde(default)]
    pub mean: BTreeMap<String, f64>,
    #[serde(default)]
    pub median: BTreeMap<String, f64>,
    #[serde(default)]
    pub change_percent: BTreeMap<String, f64>,
    #[serde(default)]
    pub key_metrics_change_percent: f64,
}

/// Factors the model considers to explain the movement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Factors {
    #[serde(default)]
    pub missing_values: String,
    #[serde(default)]
    pub categorical_data: String,
    #[serde(default)]
    pub key_factors: Vec<String>,
}

/// Cross-reference to a related report or external resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LinkEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Links {
    #[serde(default)]
    pub internal: Vec<LinkEntry>,
    #[serde(default)]
    pub external: Vec<LinkEntry>,
}

/// The structured result every analysis run produces.
///
/// This shape is the contract with the persistence collaborator: it is
/// never partially absent. [`AnalysisResult::from_value`] backfills
/// whatever the model forgot or mangled, so callers can rely on every
/// field being present and typed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub title: String,
    pub summary: String,
    #[serde(alias = "period_data")]
    pub period: Period,
    pub dynamics: Dynamics,
    pub factors: Factors,
    pub links: Links,
    pub completed_tasks: Vec<String>,
    pub pending_tasks: Vec<String>,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            title: "Analysis results".into(),
            summary: "No analysis results are available.".into(),
            period: Period::default(),
            dynamics: Dynamics::default(),
            factors: Factors::default(),
            links: Links::default(),
            completed_tasks: Vec::new(),
            pending_tasks: Vec::new(),
        }
    }
}

impl AnalysisResult {
    /// Coerce arbitrary model JSON into the full result shape.
    ///
    /// Tolerates the failure modes models actually produce: missing
    /// fields, `period` or `factors` returned as prose strings, task
    /// lists with non-string entries. Anything unusable falls back to a
    /// deterministic default, field by field.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        let mut result = Self::default();

        if let Some(title) = non_empty_str(map.get("title")) {
            result.title = title;
        }
        if let Some(summary) = non_empty_str(map.get("summary")) {
            result.summary = summary;
        }

        match map.get("period").or_else(|| map.get("period_data")) {
            Some(value @ Value::Object(_)) => {
                if let Ok(period) = serde_json::from_value::<Period>(value.clone()) {
                    result.period = normalize_period(period);
                }
            }
            // Prose period: pull dates out of the text
            Some(Value::String(text)) => {
                let (start, end) = period_dates(text);
                if let Some(start) = start {
                    result.period.start_date = start;
                }
                if let Some(end) = end {
                    result.period.end_date = end;
                }
            }
            _ => {}
        }

        if let Some(dynamics) = map.get("dynamics") {
            result.dynamics =
                serde_json::from_value(dynamics.clone()).unwrap_or_default();
        }

        match map.get("factors") {
            Some(value @ Value::Object(_)) => {
                result.factors = serde_json::from_value(value.clone()).unwrap_or_default();
            }
            // Prose factors: salvage the bullet items
            Some(Value::String(text)) => {
                result.factors.key_factors = extract_bullets(text);
            }
            _ => {}
        }

        if let Some(links) = map.get("links") {
            result.links = serde_json::from_value(links.clone()).unwrap_or_default();
        }

        result.completed_tasks = string_list(map.get("completed_tasks"));
        result.pending_tasks = string_list(map.get("pending_tasks"));

        result
    }

    /// Boundary backfill: a still-default dynamics block gets the real
    /// dataset dimensions so the caller sees the data volume analyzed.
    pub fn backfill_totals(&mut self, total_rows: u64, total_columns: u64) {
        if self.dynamics == Dynamics::default() {
            self.dynamics.total_rows = total_rows;
            self.dynamics.total_columns = total_columns;
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Blank dates inside an otherwise valid period object get defaults.
fn normalize_period(mut period: Period) -> Period {
    let defaults = Period::default();
    if period.start_date.trim().is_empty() {
        period.start_date = defaults.start_date;
    }
    if period.end_date.trim().is_empty() {
        period.end_date = defaults.end_date;
    }
    period
}
