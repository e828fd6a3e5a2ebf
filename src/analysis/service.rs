// src/analysis/service.rs
// Public facade: high-level analysis operations over the two-stage pipeline

use super::analyzer::{AnalyzerOptions, TwoStageAnalyzer};
use super::kind::AnalysisKind;
use super::result::{AnalysisResult, LinkEntry, Period};
use crate::config::ServiceConfig;
use crate::dataset::{Dataset, Record};
use crate::error::{MarketPulseError, Result};
use crate::llm::{LlmClient, Message, OpenAiClient};
use rand::Rng;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// One metric's input to trend analysis: a time series or a snapshot value.
#[derive(Debug, Clone)]
pub enum MetricInput {
    Series(Vec<f64>),
    Scalar(f64),
}

/// Granularity of the synthetic date labels attached to trend records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendPeriod {
    Day,
    Week,
    Month,
    Year,
}

impl TrendPeriod {
    /// Date label for the i-th point of a series.
    fn date_label(&self, index: usize) -> String {
        match self {
            Self::Day => format!("2023-01-{:02}", index + 1),
            Self::Week => format!("2023-W{:02}", index + 1),
            Self::Month => format!("2023-{:02}", index + 1),
            Self::Year => format!("{}", 2020 + index),
        }
    }
}

/// Result of a passthrough chat completion.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    /// Estimated prompt token count
    pub tokens: usize,
    pub model: String,
}

/// Dependency-injected entry point used by upstream request handlers.
///
/// Holds all configuration (API key, models, budgets) explicitly;
/// constructed once at process start and passed down — no module-level
/// singletons. Every public operation resolves to a fully populated
/// [`AnalysisResult`]: expected failure modes degrade, they never raise.
pub struct AnalysisService {
    analyzer: TwoStageAnalyzer,
}

impl AnalysisService {
    /// Build the service against the real OpenAI client.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| MarketPulseError::Config("OPENAI_API_KEY is not set".into()))?;
        let client: Arc<dyn LlmClient> =
            Arc::new(OpenAiClient::with_base(api_key, config.api_base.clone()));
        Ok(Self::with_client(config, client))
    }

    /// Build the service with an injected client (tests, proxies).
    pub fn with_client(config: ServiceConfig, client: Arc<dyn LlmClient>) -> Self {
        let options = AnalyzerOptions {
            batch_model: config.batch_model,
            synthesis_model: config.synthesis_model,
            temperature: config.temperature,
            budgets: config.budgets,
            retry: config.retry,
            guard: config.guard,
        };
        Self {
            analyzer: TwoStageAnalyzer::new(client, options),
        }
    }

    /// Analyze an arbitrary dataset with the kind-specific prompt.
    pub async fn analyze(
        &self,
        dataset: &Dataset,
        marketplace: Option<&str>,
        kind: AnalysisKind,
    ) -> AnalysisResult {
        let mut result = self.analyzer.analyze(dataset, marketplace, kind).await;
        result.backfill_totals(dataset.row_count() as u64, dataset.column_count() as u64);
        result
    }

    /// Analyze metric trends. Series metrics expand to one dated record
    /// per point; scalar metrics become a single record.
    pub async fn analyze_trends(
        &self,
        metrics: &BTreeMap<String, MetricInput>,
        period: TrendPeriod,
    ) -> AnalysisResult {
        let mut records: Vec<Record> = Vec::new();
        for (metric_name, input) in metrics {
            match input {
                MetricInput::Series(values) => {
                    for (i, value) in values.iter().enumerate() {
                        records.push(record(json!({
                            "metric_name": metric_name,
                            "value": value,
                            "date": period.date_label(i),
                        })));
                    }
                }
                MetricInput::Scalar(value) => {
                    records.push(record(json!({
                        "metric_name": metric_name,
                        "value": value,
                    })));
                }
            }
        }

        let dataset = Dataset::from_rows(records);
        let mut result = self
            .analyzer
            .analyze(&dataset, None, AnalysisKind::Trends)
            .await;
        result.backfill_totals(dataset.row_count() as u64, metrics.len() as u64);
        result
    }

    /// Compare our metrics against named competitors.
    ///
    /// Competitor records are synthetic: each metric is jittered within
    /// ±20% of ours. Comparison scaffolding for the model, not market
    /// data.
    pub async fn analyze_competitors(
        &self,
        marketplace: &str,
        category: &str,
        competitors: &[String],
        our_metrics: &BTreeMap<String, f64>,
    ) -> AnalysisResult {
        let mut records: Vec<Record> = Vec::new();
        for (metric_name, value) in our_metrics {
            records.push(record(json!({
                "company": "our",
                "metric_name": metric_name,
                "value": value,
            })));
        }

        // Scoped so the non-Send ThreadRng is dropped before any await
        {
            let mut rng = rand::rng();
            for competitor in competitors {
                for (metric_name, value) in our_metrics {
                    let competitor_value = value * rng.random_range(0.8..1.2);
                    records.push(record(json!({
                        "company": competitor,
                        "metric_name": metric_name,
                        "value": competitor_value,
                    })));
                }
            }
        }

        let dataset = Dataset::from_rows(records);
        let mut result = self
            .analyzer
            .analyze(&dataset, Some(marketplace), AnalysisKind::Competitors)
            .await;
        result.backfill_totals(dataset.row_count() as u64, our_metrics.len() as u64);
        result.summary = format!(
            "Competitor analysis for the {category} category on {marketplace}. {}",
            result.summary
        );
        result
    }

    /// Generate a report over period metrics, cross-referencing prior
    /// trend and competitor analyses when supplied.
    pub async fn generate_report(
        &self,
        marketplace: &str,
        metrics: &BTreeMap<String, f64>,
        period_start: &str,
        period_end: &str,
        trends: Option<&AnalysisResult>,
        competitors: Option<&AnalysisResult>,
    ) -> AnalysisResult {
        let mut records: Vec<Record> = Vec::new();
        for (metric_name, value) in metrics {
            records.push(record(json!({
                "metric_name": metric_name,
                "value": value,
                "date": period_end,
            })));
        }

        let dataset = Dataset::from_rows(records);
        let mut result = self
            .analyzer
            .analyze(&dataset, Some(marketplace), AnalysisKind::Metrics)
            .await;

        if result.period == Period::default() {
            result.period = Period {
                start_date: short_date(period_start),
                end_date: short_date(period_end),
            };
        }
        result.backfill_totals(dataset.row_count() as u64, metrics.len() as u64);

        if trends.is_some() {
            result.links.internal.push(LinkEntry {
                title: "Trend analysis".into(),
                description: "Detailed trend analysis for the selected period".into(),
            });
        }
        if competitors.is_some() {
            result.links.internal.push(LinkEntry {
                title: "Competitor analysis".into(),
                description: "Comparative analysis against competitors".into(),
            });
        }

        result
    }

    /// Passthrough chat completion under the same recovery chain.
    /// Degrades to an apologetic placeholder instead of failing.
    pub async fn chat_completion(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
        model: Option<&str>,
    ) -> ChatReply {
        let model = model
            .unwrap_or(&self.analyzer.options().synthesis_model)
            .to_string();
        let tokens = self.analyzer.counter().count_message_tokens(&messages);
        info!(tokens, model = %model, "Chat completion payload");

        match self
            .analyzer
            .call_model(&model, messages, temperature, max_tokens)
            .await
        {
            Some(content) => ChatReply {
                content,
                tokens,
                model,
            },
            None => {
                warn!("No usable chat completion response");
                ChatReply {
                    content: "The provider did not return a response. Please try again later."
                        .into(),
                    tokens,
                    model,
                }
            }
        }
    }
}

/// `"2024-03-01"` -> `"01"`; strings without a dash pass through.
fn short_date(date: &str) -> String {
    date.rsplit('-').next().unwrap_or(date).to_string()
}

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}
