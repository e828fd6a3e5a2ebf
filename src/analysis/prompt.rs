// src/analysis/prompt.rs
// PromptBuilder for consistent prompt construction across both stages

use super::kind::AnalysisKind;
use crate::llm::Message;

/// Static shared prefix for all analysis prompts. Identical across
/// calls so provider-side prompt caching gets a stable prefix.
const STATIC_PREFIX: &str = "\
You are an experienced marketplace data analyst.
Your analysis must be structured, informative and useful for decision making.
Use only facts from the provided data; never invent information the data does not contain.";

/// The JSON shape every stage must return. Repeated verbatim in the
/// system prompt and each user prompt, mirroring how strictly the
/// downstream parser depends on it.
const RESPONSE_CONTRACT: &str = "\
Return the result as a structured JSON object with the fields:
- title: analysis title
- summary: detailed summary of the analysis with the full chain of reasoning
- period: object with start_date and end_date fields holding the analysis period bounds, formatted \"DD.MM\"
- dynamics: object describing metric movement, with total_rows, total_columns, mean, median, change_percent and key_metrics_change_percent fields
- factors: object describing what drives the changes, with missing_values, categorical_data and key_factors (array) fields
- links: object with internal and external arrays
- completed_tasks: array of completed tasks
- pending_tasks: array of recommended next tasks

IMPORTANT: respond with ONLY the JSON object. Do not add explanations, commentary or text before or after the JSON. Do not wrap the JSON in markdown formatting. Return nothing but the bare JSON object.";

/// Builds the system and user messages for batch analysis and final
/// synthesis. Funnel structure: static prefix, kind-specific role,
/// response contract, then the dynamic payload in the user message.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    kind: AnalysisKind,
    marketplace: Option<String>,
}

impl PromptBuilder {
    pub fn new(kind: AnalysisKind, marketplace: Option<&str>) -> Self {
        Self {
            kind,
            marketplace: marketplace.map(str::to_string),
        }
    }

    fn marketplace_label(&self) -> &str {
        self.marketplace.as_deref().unwrap_or("an unknown marketplace")
    }

    /// Build the complete system prompt
    pub fn build_system_prompt(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            STATIC_PREFIX,
            self.kind.role_instructions(),
            RESPONSE_CONTRACT
        )
    }

    /// Messages for one batch-analysis call. `summarized` switches the
    /// framing after the payload was shrunk to fit the call ceiling.
    pub fn batch_messages(&self, payload_json: &str, summarized: bool) -> Vec<Message> {
        let framing = if summarized {
            "a data summary"
        } else {
            "data"
        };
        let user_prompt = format!(
            "I am providing {framing} for analysis from {marketplace}.\n\
             Analysis kind: {kind}\n\n\
             Data:\n```json\n{payload_json}\n```\n\n\
             Analyze this data.\n\n{contract}",
            framing = framing,
            marketplace = self.marketplace_label(),
            kind = self.kind,
            payload_json = payload_json,
            contract = RESPONSE_CONTRACT,
        );
        vec![
            Message::system(self.build_system_prompt()),
            Message::user(user_prompt),
        ]
    }

    /// Messages for the final synthesis call over prior batch results.
    pub fn synthesis_messages(&self, results_json: &str, batch_count: usize) -> Vec<Message> {
        let user_prompt = format!(
            "I ran a preliminary analysis of data from {marketplace} and got the \
             following results across {batch_count} data batches:\n\n\
             ```json\n{results_json}\n```\n\n\
             Now produce the final analysis combining all of these results into a \
             single report.\nAnalysis kind: {kind}\n\n{contract}",
            marketplace = self.marketplace_label(),
            batch_count = batch_count,
            results_json = results_json,
            kind = self.kind,
            contract = RESPONSE_CONTRACT,
        );
        vec![
            Message::system(self.build_system_prompt()),
            Message::user(user_prompt),
        ]
    }
}
