// src/analysis/budgets.rs
// Named token ceilings for each pipeline stage

/// Token ceilings and call limits for one analysis run.
///
/// `batch_token_budget` bounds what the consolidator packs into a batch;
/// `batch_call_ceiling` bounds the assembled prompt of a batch-analysis
/// call and is deliberately a separate knob — the model-call ceiling is
/// stricter than the consolidation budget and the two move independently
/// when models change. Budgets are enforced before a call is made, never
/// after: a payload over its ceiling is shrunk, not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisBudgets {
    /// Token budget a dataset digest must fit after summarization
    pub batch_token_budget: usize,
    /// Token ceiling for a full batch-analysis prompt
    pub batch_call_ceiling: usize,
    /// Token ceiling for the final synthesis prompt
    pub synthesis_call_ceiling: usize,
    /// Hard ceiling on per-run provider calls for batch analysis
    pub max_batches: usize,
    /// max_tokens sent with batch-analysis calls
    pub batch_max_output_tokens: u32,
    /// max_tokens sent with the synthesis call
    pub synthesis_max_output_tokens: u32,
}

impl Default for AnalysisBudgets {
    fn default() -> Self {
        Self {
            batch_token_budget: 3_000,
            batch_call_ceiling: 3_500,
            synthesis_call_ceiling: 3_000,
            max_batches: 3,
            batch_max_output_tokens: 2_000,
            synthesis_max_output_tokens: 4_000,
        }
    }
}
