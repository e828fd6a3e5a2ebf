// src/summary/mod.rs
// Token-budgeted reduction of raw datasets into provider-sized payloads

mod batch;
mod digest;

pub use batch::{Batch, BatchConsolidator};
pub use digest::{DataSummarizer, DatasetDigest, DigestForm, MetricSummary, TimePoint};
