// src/dataset/mod.rs
// Tabular input model: flat records plus cached derived statistics

mod stats;

pub use stats::{NumericStats, categorical_counts, numeric_column_values, numeric_stats};

use serde_json::Value;
use std::collections::BTreeMap;

/// A single flat row: column name -> scalar value.
pub type Record = serde_json::Map<String, Value>;

/// Columns with at least this many distinct values are not tracked as
/// categorical at the dataset level.
pub const CATEGORICAL_DISTINCT_LIMIT: usize = 50;

/// Tabular dataset handed in by the spreadsheet-processing collaborator.
///
/// Derived stats are a cache, never authoritative: they are recomputed
/// from `rows` on construction and again whenever a subset is taken.
/// The original rows are never mutated by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<Record>,
    columns: Vec<String>,
    numeric_stats: BTreeMap<String, NumericStats>,
    categorical_stats: BTreeMap<String, BTreeMap<String, u64>>,
}

impl Dataset {
    /// Build a dataset from records and display-ordered column names,
    /// computing derived statistics up front.
    pub fn from_records(rows: Vec<Record>, columns: Vec<String>) -> Self {
        let mut numeric = BTreeMap::new();
        let mut categorical = BTreeMap::new();

        for column in &columns {
            if let Some(values) = numeric_column_values(&rows, column) {
                if let Some(stats) = numeric_stats(&values) {
                    numeric.insert(column.clone(), stats);
                    continue;
                }
            }
            let counts = categorical_counts(&rows, column);
            if !counts.is_empty() && counts.len() < CATEGORICAL_DISTINCT_LIMIT {
                categorical.insert(column.clone(), counts);
            }
        }

        Self {
            rows,
            columns,
            numeric_stats: numeric,
            categorical_stats: categorical,
        }
    }

    /// Infer columns from the union of record keys (first-seen order).
    pub fn from_rows(rows: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self::from_records(rows, columns)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn numeric_stats(&self) -> &BTreeMap<String, NumericStats> {
        &self.numeric_stats
    }

    pub fn categorical_stats(&self) -> &BTreeMap<String, BTreeMap<String, u64>> {
        &self.categorical_stats
    }

    /// Count missing (null or absent) cells per column, columns with
    /// at least one gap only.
    pub fn missing_values(&self) -> BTreeMap<String, u64> {
        let mut missing = BTreeMap::new();
        for column in &self.columns {
            let count = self
                .rows
                .iter()
                .filter(|row| matches!(row.get(column.as_str()), None | Some(Value::Null)))
                .count() as u64;
            if count > 0 {
                missing.insert(column.clone(), count);
            }
        }
        missing
    }

    /// New dataset over a copied row subset; stats are recomputed,
    /// honoring the recomputable-cache invariant.
    pub fn subset(&self, rows: Vec<Record>) -> Self {
        Self::from_records(rows, self.columns.clone())
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;
    use serde_json::json;

    /// Five rows of revenue/orders with a date column and one gap.
    pub fn sales_dataset() -> Dataset {
        let rows: Vec<Record> = vec![
            json!({"date": "2024-01-01", "revenue": 100.0, "orders": 10, "region": "north"}),
            json!({"date": "2024-01-02", "revenue": 110.0, "orders": 12, "region": "south"}),
            json!({"date": "2024-01-03", "revenue": 121.0, "orders": null, "region": "north"}),
            json!({"date": "2024-01-04", "revenue": 133.0, "orders": 15, "region": "south"}),
            json!({"date": "2024-01-05", "revenue": 146.0, "orders": 17, "region": "north"}),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect();
        Dataset::from_records(
            rows,
            vec![
                "date".into(),
                "revenue".into(),
                "orders".into(),
                "region".into(),
            ],
        )
    }
}
