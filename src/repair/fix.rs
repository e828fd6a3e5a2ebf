// src/repair/fix.rs
// String-level repairs for almost-JSON model output

use regex::Regex;
use std::sync::LazyLock;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

/// Cumulative repair candidates, cheapest first. Each entry applies one
/// more repair on top of the previous ones; the caller tries to parse
/// after each.
pub fn repair_candidates(json_str: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    let step1 = fix_trailing_commas(json_str);
    candidates.push(step1.clone());

    let step2 = fix_quotes(&step1);
    candidates.push(step2.clone());

    let step3 = fix_double_escaping(&step2);
    candidates.push(step3);

    candidates
}

/// `{"a": 1,}` and `[1, 2,]` -> valid JSON
fn fix_trailing_commas(json_str: &str) -> String {
    TRAILING_COMMA.replace_all(json_str, "$1").into_owned()
}

/// Typographic quotes to ASCII, then single quotes to double quotes.
/// The wholesale `'` swap is lossy for apostrophes inside values, which
/// is why this runs only after a straight parse has already failed.
fn fix_quotes(json_str: &str) -> String {
    json_str
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\'', "\"")
}

/// Undo one level of escaping for payloads that arrive JSON-encoded a
/// second time: `{\"title\": \"X\"}`.
fn fix_double_escaping(json_str: &str) -> String {
    json_str.replace("\\\"", "\"").replace("\\\\", "\\")
}
