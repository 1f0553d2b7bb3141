//! Request-scoped records. Both are read leniently from arbitrary JSON
//! objects: missing or wrongly-typed fields fall back to empty values so a
//! partial record never fails a request.

pub mod candidate;
pub mod job;

use serde_json::{Map, Value};

/// Non-empty text for `key`. Numbers and booleans are rendered as text.
pub(crate) fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Ordered list of labels for `key`. Accepts an array (non-string entries are
/// skipped) or a single comma-separated string.
pub(crate) fn label_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    let labels: Vec<String> = match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };

    labels
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Non-negative whole number for `key`; anything else becomes 0.
pub(crate) fn non_negative_int(map: &Map<String, Value>, key: &str) -> u32 {
    let parsed = match map.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() && v > 0.0 => v.round().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_text_field_trims_and_skips_blank() {
        let m = map(json!({"a": "  Rust Dev ", "b": "   ", "c": 42, "d": null}));
        assert_eq!(text_field(&m, "a").as_deref(), Some("Rust Dev"));
        assert_eq!(text_field(&m, "b"), None);
        assert_eq!(text_field(&m, "c").as_deref(), Some("42"));
        assert_eq!(text_field(&m, "d"), None);
        assert_eq!(text_field(&m, "missing"), None);
    }

    #[test]
    fn test_label_list_accepts_array_and_csv() {
        let m = map(json!({
            "arr": ["Rust", 3, " Go ", ""],
            "csv": "Python, SQL ,,Docker",
            "obj": {"x": 1}
        }));
        assert_eq!(label_list(&m, "arr"), vec!["Rust", "Go"]);
        assert_eq!(label_list(&m, "csv"), vec!["Python", "SQL", "Docker"]);
        assert!(label_list(&m, "obj").is_empty());
        assert!(label_list(&m, "missing").is_empty());
    }

    #[test]
    fn test_non_negative_int_is_lenient() {
        let m = map(json!({"a": 5, "b": "7", "c": -3, "d": "many", "e": 2.6}));
        assert_eq!(non_negative_int(&m, "a"), 5);
        assert_eq!(non_negative_int(&m, "b"), 7);
        assert_eq!(non_negative_int(&m, "c"), 0);
        assert_eq!(non_negative_int(&m, "d"), 0);
        assert_eq!(non_negative_int(&m, "e"), 3);
        assert_eq!(non_negative_int(&m, "missing"), 0);
    }
}
