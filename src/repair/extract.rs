// src/repair/extract.rs
// Locate a JSON payload inside surrounding model chatter

use regex::Regex;
use std::sync::LazyLock;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex")
});

/// Contents of the first fenced ```json code block, if any.
pub fn extract_fenced_block(text: &str) -> Option<String> {
    FENCED_JSON
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The outermost `{...}` span: first opening brace through last closing
/// brace. Braces are ASCII, so byte-index slicing is safe.
pub fn extract_braced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start < end { Some(&text[start..=end]) } else { None }
}
