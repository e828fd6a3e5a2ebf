// src/analysis/analyzer.rs
// Two-stage map-reduce analysis: cheap model per batch, expensive model
// for the final synthesis

use super::budgets::AnalysisBudgets;
use super::kind::AnalysisKind;
use super::prompt::PromptBuilder;
use super::result::{AnalysisResult, Dynamics, Factors, Period};
use crate::dataset::Dataset;
use crate::llm::{
    ChatRequest, EmptyResponseGuard, LlmClient, Message, RetryPolicy, TokenCounter,
    supports_json_response_format,
};
use crate::repair::parse_safely;
use crate::summary::{Batch, BatchConsolidator};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Synthesis payloads over the ceiling keep at most this many batch summaries
const MAX_SYNTHESIS_BATCHES: usize = 2;
/// Per-batch summary text cap once the synthesis payload must shrink
const SYNTHESIS_SUMMARY_CHAR_LIMIT: usize = 200;
/// Sub-objects whose serialized form exceeds this collapse to placeholders
const COMPACT_SECTION_CHAR_LIMIT: usize = 100;

/// Model and sampling choices for one analyzer instance.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Cheap model used for per-batch analysis
    pub batch_model: String,
    /// Expensive model used for the final synthesis
    pub synthesis_model: String,
    pub temperature: f32,
    pub budgets: AnalysisBudgets,
    pub retry: RetryPolicy,
    pub guard: EmptyResponseGuard,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            batch_model: "gpt-4o-mini".into(),
            synthesis_model: "gpt-4o".into(),
            temperature: 0.7,
            budgets: AnalysisBudgets::default(),
            retry: RetryPolicy::default(),
            guard: EmptyResponseGuard::default(),
        }
    }
}

/// Orchestrates one analysis run: Consolidating -> BatchAnalyzing(i) ->
/// Synthesizing -> Done.
///
/// Batches run sequentially in index order — a deliberate trade of
/// latency for a controllable call budget — and the synthesis stage sees
/// batch results in that same order. A failure inside one batch is
/// substituted with the kind's default response for that batch only;
/// one bad batch never aborts the run.
pub struct TwoStageAnalyzer {
    client: Arc<dyn LlmClient>,
    counter: Arc<TokenCounter>,
    consolidator: BatchConsolidator,
    options: AnalyzerOptions,
}

impl TwoStageAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>, options: AnalyzerOptions) -> Self {
        let counter = Arc::new(TokenCounter::new(&options.batch_model));
        let consolidator = BatchConsolidator::new(
            options.budgets.max_batches,
            options.budgets.batch_token_budget,
            counter.clone(),
        );
        Self {
            client,
            counter,
            consolidator,
            options,
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub(crate) fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Run the full two-stage analysis over a dataset.
    pub async fn analyze(
        &self,
        dataset: &Dataset,
        marketplace: Option<&str>,
        kind: AnalysisKind,
    ) -> AnalysisResult {
        let batches = self.consolidator.consolidate(dataset);
        info!(batches = batches.len(), kind = %kind, "Consolidated data into batches");

        let mut batch_results = Vec::with_capacity(batches.len());
        for (i, batch) in batches.iter().enumerate() {
            info!(batch = i + 1, total = batches.len(), "Analyzing batch");
            batch_results.push(self.analyze_batch(batch, marketplace, kind).await);
        }

        self.synthesize(&batch_results, marketplace, kind).await
    }

    /// Analyze one batch with the cheap model. Never fails: any
    /// unrecoverable provider outcome degrades to the kind default.
    pub async fn analyze_batch(
        &self,
        batch: &Batch,
        marketplace: Option<&str>,
        kind: AnalysisKind,
    ) -> AnalysisResult {
        let builder = PromptBuilder::new(kind, marketplace);

        let mut digest = batch.digest.clone();
        let mut messages = builder.batch_messages(&digest.to_json(), false);
        let mut tokens = self.counter.count_message_tokens(&messages);
        info!(tokens, batch_index = batch.batch_index, "Batch analysis payload");

        // The call ceiling is stricter than the consolidation budget;
        // shrink the digest and rebuild the prompt when it overflows
        if tokens > self.options.budgets.batch_call_ceiling {
            warn!(
                tokens,
                ceiling = self.options.budgets.batch_call_ceiling,
                "Batch payload exceeds call ceiling, shrinking digest"
            );
            digest.reduce_for_call();
            messages = builder.batch_messages(&digest.to_json(), true);
            tokens = self.counter.count_message_tokens(&messages);
            info!(tokens, "Shrunk batch analysis payload");
        }

        let content = self
            .call_model(
                &self.options.batch_model,
                messages,
                self.options.temperature,
                self.options.budgets.batch_max_output_tokens,
            )
            .await;

        match content {
            Some(raw) => AnalysisResult::from_value(parse_safely(&raw)),
            None => {
                warn!(
                    batch_index = batch.batch_index,
                    "No usable batch response, substituting default"
                );
                kind.default_response()
            }
        }
    }

    /// Combine batch results into the final report with the expensive
    /// model. Only prior-stage conclusions are forwarded — never raw
    /// rows — so the synthesis payload stays bounded regardless of the
    /// original dataset size.
    pub async fn synthesize(
        &self,
        batch_results: &[AnalysisResult],
        marketplace: Option<&str>,
        kind: AnalysisKind,
    ) -> AnalysisResult {
        let mut normalized: Vec<BatchSummary> = batch_results
            .iter()
            .enumerate()
            .map(|(i, result)| BatchSummary::from_result(i, result))
            .collect();

        if normalized.is_empty() {
            warn!("No batch results to synthesize");
            return kind.default_response();
        }

        let builder = PromptBuilder::new(kind, marketplace);
        let mut messages =
            builder.synthesis_messages(&to_json(&normalized), normalized.len());
        let mut tokens = self.counter.count_message_tokens(&messages);
        info!(tokens, "Final synthesis payload");

        if tokens > self.options.budgets.synthesis_call_ceiling {
            warn!(
                tokens,
                ceiling = self.options.budgets.synthesis_call_ceiling,
                "Synthesis payload exceeds ceiling, truncating batch summaries"
            );
            normalized.truncate(MAX_SYNTHESIS_BATCHES);
            for summary in &mut normalized {
                summary.compact();
            }
            messages = builder.synthesis_messages(&to_json(&normalized), normalized.len());
            tokens = self.counter.count_message_tokens(&messages);
            info!(tokens, "Shrunk final synthesis payload");
        }

        let content = self
            .call_model(
                &self.options.synthesis_model,
                messages,
                self.options.temperature,
                self.options.budgets.synthesis_max_output_tokens,
            )
            .await;

        match content {
            Some(raw) => AnalysisResult::from_value(parse_safely(&raw)),
            None => {
                warn!("No usable synthesis response, substituting default");
                kind.default_response()
            }
        }
    }

    /// One provider call under the full recovery chain: exponential-
    /// backoff retry inside the empty-response guard.
    pub(crate) async fn call_model(
        &self,
        model: &str,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Option<String> {
        let mut request = ChatRequest::new(model, messages)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);
        if supports_json_response_format(model) {
            request = request.with_json_object_format();
        }

        self.options
            .guard
            .call_with_guard(|| {
                let request = request.clone();
                async move {
                    let outcome = self
                        .options
                        .retry
                        .execute(|| self.client.chat(request.clone()))
                        .await?;
                    Ok(outcome.content)
                }
            })
            .await
    }
}

/// Compact projection of one batch result forwarded to the synthesis
/// stage. Keeps `batch_index` so ordering survives serialization.
#[derive(Debug, Clone, Serialize)]
struct BatchSummary {
    batch_index: usize,
    title: String,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    period: Option<Period>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dynamics: Option<Dynamics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    factors: Option<Factors>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    completed_tasks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pending_tasks: Vec<String>,
}

impl BatchSummary {
    fn from_result(index: usize, result: &AnalysisResult) -> Self {
        Self {
            batch_index: index,
            title: result.title.clone(),
            summary: result.summary.clone(),
            period: Some(result.period.clone()),
            dynamics: (result.dynamics != Dynamics::default())
                .then(|| result.dynamics.clone()),
            factors: (result.factors != Factors::default()).then(|| result.factors.clone()),
            completed_tasks: result.completed_tasks.clone(),
            pending_tasks: result.pending_tasks.clone(),
        }
    }

    /// Shrink for an over-ceiling synthesis payload: cap the summary
    /// text, collapse bulky sub-objects to placeholders.
    fn compact(&mut self) {
        if self.summary.chars().count() > SYNTHESIS_SUMMARY_CHAR_LIMIT {
            self.summary = self
                .summary
                .chars()
                .take(SYNTHESIS_SUMMARY_CHAR_LIMIT)
                .collect::<String>()
                + "...";
        }
        if serialized_len(&self.period) > COMPACT_SECTION_CHAR_LIMIT {
            self.period = Some(Period::default());
        }
        if serialized_len(&self.dynamics) > COMPACT_SECTION_CHAR_LIMIT {
            self.dynamics = Some(Dynamics::default());
        }
        if serialized_len(&self.factors) > COMPACT_SECTION_CHAR_LIMIT {
            self.factors = Some(Factors::default());
        }
    }
}

fn serialized_len<T: Serialize>(value: &T) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(title: &str, summary: &str) -> AnalysisResult {
        AnalysisResult {
            title: title.into(),
            summary: summary.into(),
            ..AnalysisResult::default()
        }
    }

    #[test]
    fn test_batch_summary_keeps_index_and_drops_defaults() {
        let result = result_with("batch", "fine");
        let summary = BatchSummary::from_result(2, &result);
        assert_eq!(summary.batch_index, 2);
        // Default dynamics/factors carry no information forward
        assert!(summary.dynamics.is_none());
        assert!(summary.factors.is_none());
    }

    #[test]
    fn test_batch_summary_forwards_populated_sections() {
        let mut result = result_with("batch", "fine");
        result.dynamics.key_metrics_change_percent = 12.0;
        let summary = BatchSummary::from_result(0, &result);
        assert!(summary.dynamics.is_some());
    }

    #[test]
    fn test_compact_caps_summary() {
        let mut summary = BatchSummary::from_result(0, &result_with("t", &"x".repeat(500)));
        summary.compact();
        assert_eq!(summary.summary.chars().count(), SYNTHESIS_SUMMARY_CHAR_LIMIT + 3);
        assert!(summary.summary.ends_with("..."));
    }

    #[test]
    fn test_compact_collapses_bulky_dynamics() {
        let mut result = result_with("t", "s");
        for i in 0..20 {
            result.dynamics.mean.insert(format!("metric_{i}"), i as f64);
        }
        let mut summary = BatchSummary::from_result(0, &result);
        summary.compact();
        assert_eq!(summary.dynamics, Some(Dynamics::default()));
    }

    #[test]
    fn test_compact_short_summary_untouched() {
        let mut summary = BatchSummary::from_result(0, &result_with("t", "short"));
        summary.compact();
        assert_eq!(summary.summary, "short");
    }

    #[test]
    fn test_serialization_skips_empty_task_lists() {
        let summary = BatchSummary::from_result(0, &result_with("t", "s"));
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("completed_tasks"));
        assert!(json.contains("batch_index"));
    }
}
