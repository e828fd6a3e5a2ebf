// src/repair/fallback.rs
// Pattern-matched extraction of a result shape from free-form model text

use chrono::Local;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

/// Summary excerpt cap when the raw text stands in for a summary
const RAW_SUMMARY_LIMIT: usize = 1000;

/// Which result field a section rule feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Title,
    Summary,
    Period,
    Dynamics,
    Factors,
    CompletedTasks,
    PendingTasks,
}

/// Ordered label table driving the free-text extraction. First match
/// per field wins; later rules for an already-filled field are skipped.
static SECTION_RULES: LazyLock<Vec<(TextField, Regex)>> = LazyLock::new(|| {
    vec![
        (
            TextField::Title,
            Regex::new(r"(?m)^#+\s*(.+?)\s*$").expect("valid regex"),
        ),
        (
            TextField::Title,
            Regex::new(r"(?im)^title:\s*(.+)$").expect("valid regex"),
        ),
        (
            TextField::Summary,
            Regex::new(r"(?is)(?:summary|overview):\s*(.+?)(?:\n\n|\n#|$)").expect("valid regex"),
        ),
        (
            TextField::Period,
            Regex::new(r"(?is)(?:period|reporting period|analysis period):\s*(.+?)(?:\n\n|\n#|$)")
                .expect("valid regex"),
        ),
        (
            TextField::Dynamics,
            Regex::new(r"(?is)dynamics:\s*(.+?)(?:\n\n|\n#|$)").expect("valid regex"),
        ),
        (
            TextField::Factors,
            Regex::new(r"(?is)(?:key factors|factors):\s*(.+?)(?:\n\n|\n#|$)")
                .expect("valid regex"),
        ),
        (
            TextField::CompletedTasks,
            Regex::new(r"(?is)completed tasks:\s*(.+?)(?:\n\n|\n#|$)").expect("valid regex"),
        ),
        (
            TextField::PendingTasks,
            Regex::new(r"(?is)(?:pending|planned|recommended|next)\s+(?:tasks|steps):\s*(.+?)(?:\n\n|\n#|$)")
                .expect("valid regex"),
        ),
    ]
});

static START_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:from|since|start(?:ing)?(?:\s+on)?)\s+(\d{1,2}[./-]\d{1,2}(?:[./-]\d{2,4})?)")
        .expect("valid regex")
});
static END_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:to|until|through|end(?:ing)?(?:\s+on)?)\s+(\d{1,2}[./-]\d{1,2}(?:[./-]\d{2,4})?)")
        .expect("valid regex")
});
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*]\s*(.+?)\s*$").expect("valid regex"));
static MEAN_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)mean(?:\s+value)?(?:\s+for)?\s+([^:\n]+):\s*(-?[0-9][0-9.]*)")
        .expect("valid regex")
});
static MEDIAN_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)median(?:\s+for)?\s+([^:\n]+):\s*(-?[0-9][0-9.]*)").expect("valid regex")
});
static CHANGE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)change(?:\s+in\s+percent)?(?:\s+for)?\s+([^:\n]+):\s*(-?[0-9][0-9.]*)%")
        .expect("valid regex")
});
static KEY_METRICS_CHANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)key\s+metrics\s+changed\s+by\s+(-?[0-9][0-9.]*)%").expect("valid regex")
});

/// Build a complete result-shaped object from free text.
///
/// Every required field of the analysis result is present with a sane
/// default; whatever the label table can pull out of the text overrides
/// the defaults. This path never fails, guaranteeing the pipeline always
/// has a well-shaped result to return.
pub fn fallback_response(raw: &str, error: Option<&str>) -> Value {
    let today = Local::now().format("%d.%m").to_string();
    let summary_default = if raw.trim().is_empty() {
        "No analysis results are available.".to_string()
    } else {
        truncate_chars(raw.trim(), RAW_SUMMARY_LIMIT)
    };

    let mut response = json!({
        "title": "Analysis results",
        "summary": summary_default,
        "period": {"start_date": today, "end_date": today},
        "dynamics": {
            "total_rows": 0,
            "total_columns": 0,
            "mean": {},
            "median": {},
            "change_percent": {},
            "key_metrics_change_percent": 0.0
        },
        "factors": {
            "missing_values": "",
            "categorical_data": "",
            "key_factors": []
        },
        "links": {"internal": [], "external": []},
        "completed_tasks": [],
        "pending_tasks": []
    });

    if let Some(message) = error {
        response["error"] = json!(message);
    }

    if raw.trim().is_empty() {
        return response;
    }

    let mut filled: Vec<TextField> = Vec::new();
    for (field, pattern) in SECTION_RULES.iter() {
        if filled.contains(field) {
            continue;
        }
        let Some(section) = pattern.captures(raw).and_then(|c| c.get(1)) else {
            continue;
        };
        let section = section.as_str().trim();
        if section.is_empty() {
            continue;
        }
        filled.push(*field);

        match field {
            TextField::Title => response["title"] = json!(section),
            TextField::Summary => response["summary"] = json!(section),
            TextField::Period => apply_period(&mut response, section),
            TextField::Dynamics => apply_dynamics(&mut response, section),
            TextField::Factors => {
                let bullets = extract_bullets(section);
                if !bullets.is_empty() {
                    response["factors"]["key_factors"] = json!(bullets);
                }
            }
            TextField::CompletedTasks => {
                response["completed_tasks"] = json!(extract_bullets(section));
            }
            TextField::PendingTasks => {
                response["pending_tasks"] = json!(extract_bullets(section));
            }
        }
    }

    response
}

/// Pull DD.MM-style dates out of a prose period description.
pub fn period_dates(text: &str) -> (Option<String>, Option<String>) {
    let start = START_DATE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let end = END_DATE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    (start, end)
}

fn apply_period(response: &mut Value, text: &str) {
    let (start, end) = period_dates(text);
    if let Some(start) = start {
        response["period"]["start_date"] = json!(start);
    }
    if let Some(end) = end {
        response["period"]["end_date"] = json!(end);
    }
}

fn apply_dynamics(response: &mut Value, text: &str) {
    let mut means = Map::new();
    for caps in MEAN_ENTRY.captures_iter(text) {
        if let Ok(value) = caps[2].parse::<f64>() {
            means.insert(caps[1].trim().to_string(), json!(value));
        }
    }
    if !means.is_empty() {
        response["dynamics"]["mean"] = Value::Object(means);
    }

    let mut medians = Map::new();
    for caps in MEDIAN_ENTRY.captures_iter(text) {
        if let Ok(value) = caps[2].parse::<f64>() {
            medians.insert(caps[1].trim().to_string(), json!(value));
        }
    }
    if !medians.is_empty() {
        response["dynamics"]["median"] = Value::Object(medians);
    }

    let mut changes = Map::new();
    for caps in CHANGE_ENTRY.captures_iter(text) {
        if let Ok(value) = caps[2].parse::<f64>() {
            changes.insert(caps[1].trim().to_string(), json!(value));
        }
    }
    if !changes.is_empty() {
        response["dynamics"]["change_percent"] = Value::Object(changes);
    }

    if let Some(caps) = KEY_METRICS_CHANGE.captures(text) {
        if let Ok(value) = caps[1].parse::<f64>() {
            response["dynamics"]["key_metrics_change_percent"] = json!(value);
        }
    }
}

/// Extract bullet items from a section.
pub fn extract_bullets(text: &str) -> Vec<String> {
    BULLET
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_has_placeholders() {
        let value = fallback_response("", None);
        assert_eq!(value["title"], "Analysis results");
        assert_eq!(value["summary"], "No analysis results are available.");
        assert_eq!(value["dynamics"]["total_rows"], 0);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_annotation() {
        let value = fallback_response("", Some("no parseable JSON"));
        assert_eq!(value["error"], "no parseable JSON");
    }

    #[test]
    fn test_heading_becomes_title() {
        let value = fallback_response("# Q3 Sales Review\n\nAll good.", None);
        assert_eq!(value["title"], "Q3 Sales Review");
    }

    #[test]
    fn test_labeled_sections() {
        let text = "\
# Marketplace report
Summary: Revenue grew steadily across the period.

Key factors:
- seasonal demand
- improved listings

Completed tasks:
- collected metrics

Pending tasks:
- follow up on returns
";
        let value = fallback_response(text, None);
        assert_eq!(value["title"], "Marketplace report");
        assert_eq!(value["summary"], "Revenue grew steadily across the period.");
        assert_eq!(
            value["factors"]["key_factors"],
            serde_json::json!(["seasonal demand", "improved listings"])
        );
        assert_eq!(
            value["completed_tasks"],
            serde_json::json!(["collected metrics"])
        );
        assert_eq!(
            value["pending_tasks"],
            serde_json::json!(["follow up on returns"])
        );
    }

    #[test]
    fn test_period_dates_extracted() {
        let value = fallback_response("Period: from 01.03 to 31.03 this year", None);
        assert_eq!(value["period"]["start_date"], "01.03");
        assert_eq!(value["period"]["end_date"], "31.03");
    }

    #[test]
    fn test_dynamics_numbers_extracted() {
        let text = "Dynamics: mean for revenue: 120.5, median for revenue: 118, change for revenue: 21.0%, key metrics changed by 21.0%";
        let value = fallback_response(text, None);
        assert_eq!(value["dynamics"]["mean"]["revenue"], 120.5);
        assert_eq!(value["dynamics"]["median"]["revenue"], 118.0);
        assert_eq!(value["dynamics"]["change_percent"]["revenue"], 21.0);
        assert_eq!(value["dynamics"]["key_metrics_change_percent"], 21.0);
    }

    #[test]
    fn test_prose_is_summary_excerpt() {
        let value = fallback_response("Just words, no structure.", None);
        assert_eq!(value["summary"], "Just words, no structure.");
    }

    #[test]
    fn test_long_prose_truncated() {
        let long = "a".repeat(5000);
        let value = fallback_response(&long, None);
        assert_eq!(value["summary"].as_str().unwrap().len(), 1000);
    }
}
