// src/summary/batch.rs
// Greedy token-budget batching with a hard ceiling on provider calls

use super::digest::{DataSummarizer, DatasetDigest};
use crate::dataset::{Dataset, Record};
use crate::llm::TokenCounter;
use std::sync::Arc;
use tracing::info;

/// One row-partition of the dataset, sized for a single provider call.
///
/// Rows are partitioned, never duplicated: across a consolidation run
/// every original row lands in exactly one batch. `merged_from` records
/// provenance when the max-batch ceiling forced groups of batches to be
/// coalesced; a merged batch's digest is re-summarized from the union of
/// its group's rows, so merging loses resolution but not coverage.
#[derive(Debug, Clone)]
pub struct Batch {
    pub rows: Vec<Record>,
    pub columns: Vec<String>,
    pub batch_index: usize,
    pub merged_from: Option<Vec<usize>>,
    pub digest: DatasetDigest,
}

/// Splits a dataset into at most `max_batches` batches, each summarized
/// within the per-batch token budget.
pub struct BatchConsolidator {
    max_batches: usize,
    token_budget: usize,
    counter: Arc<TokenCounter>,
    summarizer: DataSummarizer,
}

impl BatchConsolidator {
    pub fn new(max_batches: usize, token_budget: usize, counter: Arc<TokenCounter>) -> Self {
        let summarizer = DataSummarizer::new(token_budget, counter.clone());
        Self {
            max_batches: max_batches.max(1),
            token_budget,
            counter,
            summarizer,
        }
    }

    /// Partition the dataset into budget-sized batches.
    ///
    /// Small datasets (row_count <= max_batches) and empty datasets come
    /// back as a single batch, unsplit. The greedy pass guarantees no
    /// batch's raw rows knowingly exceed the budget; the summarizer then
    /// bounds what actually goes on the wire.
    pub fn consolidate(&self, dataset: &Dataset) -> Vec<Batch> {
        if dataset.row_count() <= self.max_batches {
            return vec![Batch {
                rows: dataset.rows().to_vec(),
                columns: dataset.columns().to_vec(),
                batch_index: 0,
                merged_from: None,
                digest: self.summarizer.summarize(dataset),
            }];
        }

        let batches = self.split_by_token_budget(dataset);

        if batches.len() > self.max_batches {
            info!(
                batches = batches.len(),
                max_batches = self.max_batches,
                "Too many batches, merging contiguous groups"
            );
            let merged = self.merge_batches(dataset, batches);
            info!(batches = merged.len(), "Merged into batch groups");
            return merged;
        }

        info!(batches = batches.len(), "Token-based consolidation complete");
        batches
    }

    /// Greedy bin-packing in original row order: seal the accumulating
    /// batch before a row would push it past the token budget.
    fn split_by_token_budget(&self, dataset: &Dataset) -> Vec<Batch> {
        let mut batches: Vec<Batch> = Vec::new();
        let mut current: Vec<Record> = Vec::new();
        let mut current_tokens = 0usize;

        for row in dataset.rows() {
            let row_json = serde_json::to_string(row).unwrap_or_default();
            let row_tokens = self.counter.count_tokens(&row_json);

            if current_tokens + row_tokens > self.token_budget && !current.is_empty() {
                batches.push(self.seal(dataset, std::mem::take(&mut current), batches.len()));
                current_tokens = 0;
            }

            current.push(row.clone());
            current_tokens += row_tokens;
        }

        if !current.is_empty() {
            batches.push(self.seal(dataset, current, batches.len()));
        }

        batches
    }

    fn seal(&self, dataset: &Dataset, rows: Vec<Record>, index: usize) -> Batch {
        let subset = dataset.subset(rows.clone());
        Batch {
            rows,
            columns: dataset.columns().to_vec(),
            batch_index: index,
            merged_from: None,
            digest: self.summarizer.summarize(&subset),
        }
    }

    /// Coalesce contiguous batch ranges until the count fits the call
    /// ceiling. Each merged batch re-summarizes the union of its group's
    /// rows rather than keeping one representative.
    fn merge_batches(&self, dataset: &Dataset, batches: Vec<Batch>) -> Vec<Batch> {
        let group_size = batches.len().div_ceil(self.max_batches);
        let mut merged: Vec<Batch> = Vec::new();

        for group in batches.chunks(group_size) {
            let batch_index = merged.len();
            if group.len() == 1 {
                let mut batch = group[0].clone();
                batch.batch_index = batch_index;
                merged.push(batch);
                continue;
            }

            let union_rows: Vec<Record> = group
                .iter()
                .flat_map(|batch| batch.rows.iter().cloned())
                .collect();
            let subset = dataset.subset(union_rows.clone());
            merged.push(Batch {
                rows: union_rows,
                columns: dataset.columns().to_vec(),
                batch_index,
                merged_from: Some(group.iter().map(|batch| batch.batch_index).collect()),
                digest: self.summarizer.summarize(&subset),
            });
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter() -> Arc<TokenCounter> {
        Arc::new(TokenCounter::new("gpt-4o-mini"))
    }

    fn dated_dataset(rows: usize) -> Dataset {
        let records = (0..rows)
            .map(|i| {
                let mut record = Record::new();
                record.insert("date".into(), json!(format!("2024-01-{:02}", (i % 28) + 1)));
                record.insert("revenue".into(), json!(100.0 + i as f64));
                record.insert("orders".into(), json!(i as f64));
                record
            })
            .collect();
        Dataset::from_rows(records)
    }

    fn row_key(record: &Record) -> String {
        serde_json::to_string(record).unwrap()
    }

    // ========================================================================
    // Small and empty inputs
    // ========================================================================

    #[test]
    fn test_empty_dataset_single_batch() {
        let consolidator = BatchConsolidator::new(3, 2000, counter());
        let batches = consolidator.consolidate(&Dataset::default());
        assert_eq!(batches.len(), 1);
        assert!(batches[0].rows.is_empty());
        assert!(batches[0].merged_from.is_none());
    }

    #[test]
    fn test_small_dataset_not_split() {
        let consolidator = BatchConsolidator::new(3, 2000, counter());
        let batches = consolidator.consolidate(&dated_dataset(3));
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].rows.len(), 3);
    }

    #[test]
    fn test_five_rows_three_batches_budget_2000() {
        let consolidator = BatchConsolidator::new(3, 2000, counter());
        let batches = consolidator.consolidate(&dated_dataset(5));
        assert!(batches.len() <= 3);
        let total_rows: usize = batches.iter().map(|b| b.rows.len()).sum();
        assert_eq!(total_rows, 5);
    }

    // ========================================================================
    // Partitioning
    // ========================================================================

    #[test]
    fn test_partition_invariant_no_loss_no_duplication() {
        let dataset = dated_dataset(40);
        // Tiny budget forces many batches, then merging
        let consolidator = BatchConsolidator::new(3, 40, counter());
        let batches = consolidator.consolidate(&dataset);
        assert!(batches.len() <= 3);

        let mut seen: Vec<String> = batches
            .iter()
            .flat_map(|batch| batch.rows.iter().map(row_key))
            .collect();
        let mut expected: Vec<String> = dataset.rows().iter().map(row_key).collect();
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_batches_are_indexed_in_order() {
        let consolidator = BatchConsolidator::new(4, 60, counter());
        let batches = consolidator.consolidate(&dated_dataset(30));
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.batch_index, i);
        }
    }

    #[test]
    fn test_merged_batches_record_provenance() {
        let dataset = dated_dataset(40);
        let consolidator = BatchConsolidator::new(2, 40, counter());
        let batches = consolidator.consolidate(&dataset);
        assert!(batches.len() <= 2);

        let merged: Vec<&Batch> = batches
            .iter()
            .filter(|batch| batch.merged_from.is_some())
            .collect();
        assert!(!merged.is_empty(), "tiny budget must force merging");
        for batch in merged {
            let sources = batch.merged_from.as_ref().unwrap();
            assert!(sources.len() > 1);
            // Re-summarized union digest covers every merged row
            assert_eq!(batch.digest.row_count, batch.rows.len() as u64);
        }
    }

    #[test]
    fn test_merge_respects_ceiling_when_not_divisible() {
        // 7 pre-merge batches into max 3 must not yield 4 groups
        let dataset = dated_dataset(35);
        let consolidator = BatchConsolidator::new(3, 80, counter());
        let batches = consolidator.consolidate(&dataset);
        assert!(batches.len() <= 3);
    }

    #[test]
    fn test_unmerged_batch_digest_matches_subset() {
        let consolidator = BatchConsolidator::new(10, 200, counter());
        let batches = consolidator.consolidate(&dated_dataset(12));
        for batch in &batches {
            assert_eq!(batch.digest.row_count, batch.rows.len() as u64);
        }
    }
}
