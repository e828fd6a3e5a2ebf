// src/repair/mod.rs
// Total JSON recovery for model output: parse, extract, repair, fall back

mod extract;
mod fix;
mod fallback;

pub use extract::{extract_braced_span, extract_fenced_block};
pub use fallback::{extract_bullets, fallback_response, period_dates};
pub use fix::repair_candidates;

use serde_json::Value;
use tracing::{debug, warn};

/// Parse model output into a JSON object, never failing.
///
/// Cascade, in order:
/// 1. direct parse;
/// 2. fenced ```json block, then the outermost `{...}` span, each with
///    string-level repairs;
/// 3. pattern-matched extraction from the free text, which always
///    produces a complete result shape.
///
/// Non-object JSON (a bare number, array, string) counts as a failed
/// parse: every caller downstream expects a keyed result.
pub fn parse_safely(raw: &str) -> Value {
    if let Some(value) = parse_object(raw) {
        return value;
    }

    if let Some(block) = extract_fenced_block(raw) {
        if let Some(value) = parse_with_repairs(&block) {
            debug!("Recovered JSON from fenced block");
            return value;
        }
    }

    if let Some(span) = extract_braced_span(raw) {
        if let Some(value) = parse_with_repairs(span) {
            debug!("Recovered JSON from braced span");
            return value;
        }
    }

    warn!(
        content_len = raw.len(),
        "No parseable JSON in model output, extracting from free text"
    );
    fallback_response(raw, Some("no parseable JSON in model output"))
}

/// Direct parse, then each cumulative repair candidate in order.
fn parse_with_repairs(candidate: &str) -> Option<Value> {
    if let Some(value) = parse_object(candidate) {
        return Some(value);
    }
    for repaired in repair_candidates(candidate) {
        if let Some(value) = parse_object(&repaired) {
            debug!("String-level repair produced valid JSON");
            return Some(value);
        }
    }
    None
}

fn parse_object(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
