// src/dataset/stats.rs
// Per-column statistics derived from raw records

use super::Record;
use serde_json::Value;
use std::collections::BTreeMap;

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    /// Sample variance (n-1 denominator); 0.0 for a single value.
    pub variance: f64,
    pub first: f64,
    pub last: f64,
}

impl NumericStats {
    /// Relative change from first to last value, in percent.
    /// Defined as 0 when the first value is 0 (explicit policy, not a crash).
    pub fn change_percent(&self) -> f64 {
        if self.first == 0.0 {
            0.0
        } else {
            (self.last - self.first) / self.first * 100.0
        }
    }
}

/// Extract a column's values as f64 if every non-null cell is numeric.
/// Returns None for columns with any non-numeric scalar or no values at all.
pub fn numeric_column_values(rows: &[Record], column: &str) -> Option<Vec<f64>> {
    let mut values = Vec::new();
    for row in rows {
        match row.get(column) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => values.push(n.as_f64()?),
            Some(_) => return None,
        }
    }
    if values.is_empty() { None } else { Some(values) }
}

/// Compute descriptive statistics over a non-empty value slice.
pub fn numeric_stats(values: &[f64]) -> Option<NumericStats> {
    let first = *values.first()?;
    let last = *values.last()?;
    let n = values.len() as f64;

    let sum: f64 = values.iter().sum();
    let mean = sum / n;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = if sorted.len() % 2 == 1 {
        sorted[sorted.len() / 2]
    } else {
        (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
    };

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    let variance = if values.len() > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };

    Some(NumericStats {
        mean,
        median,
        min,
        max,
        sum,
        variance,
        first,
        last,
    })
}

/// Distinct-value histogram for a column, keys stringified.
/// Null and absent cells are not counted.
pub fn categorical_counts(rows: &[Record], column: &str) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for row in rows {
        match row.get(column) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => *counts.entry(s.clone()).or_insert(0) += 1,
            Some(other) => *counts.entry(other.to_string()).or_insert(0) += 1,
        }
    }
    counts
}
