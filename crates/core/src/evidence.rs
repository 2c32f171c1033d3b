//! Compact evidence snapshots of probe responses.
//!
//! Reports keep a small, stable subset of each response (status code plus a
//! few truncated fields) instead of the raw payload.

use serde_json::{json, Map, Value};

/// Maximum characters kept per evidence text field.
pub const EVIDENCE_TEXT_LIMIT: usize = 240;

/// Truncate `text` to at most `limit` characters, marking the cut with `...`.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Build the evidence object for one HTTP response.
///
/// `body` is `None` when the response was not valid JSON.
pub fn compact_response(status: u16, body: Option<&Value>) -> Value {
    let mut evidence = Map::new();
    evidence.insert("status_code".to_string(), json!(status));

    let Some(body) = body else {
        evidence.insert("json".to_string(), Value::Bool(false));
        return Value::Object(evidence);
    };

    for field in ["status", "message", "detail", "degrade_level"] {
        if let Some(text) = body.get(field).and_then(text_of) {
            evidence.insert(field.to_string(), Value::String(text));
        }
    }

    if let Some(run_mode) = body.pointer("/run_fingerprint/run_mode").and_then(text_of) {
        evidence.insert("run_mode".to_string(), Value::String(run_mode));
    }

    Value::Object(evidence)
}

/// `detail` as a trimmed string if the body carries a non-empty one.
///
/// Structured details (objects, arrays) count as non-empty when they hold
/// at least one entry.
pub fn structured_detail(body: &Value) -> Option<String> {
    let detail = body.get("detail")?;
    let present = match detail {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    };
    if present {
        text_of(detail)
    } else {
        None
    }
}

/// Render a field as truncated text; `null` is treated as absent.
fn text_of(value: &Value) -> Option<String> {
    let raw = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(truncate(&raw, EVIDENCE_TEXT_LIMIT))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn truncate_marks_cut_and_respects_char_boundaries() {
        let cut = truncate("éééééééééé", 6);
        assert_eq!(cut, "ééé...");
        assert_eq!(cut.chars().count(), 6);
    }

    #[test]
    fn compact_keeps_only_known_fields() {
        let body = json!({
            "status": "done",
            "degrade_level": "L1",
            "run_fingerprint": {"run_mode": "degraded", "seed": 7},
            "itinerary": [1, 2, 3],
        });
        let evidence = compact_response(200, Some(&body));
        assert_eq!(
            evidence,
            json!({
                "status_code": 200,
                "status": "done",
                "degrade_level": "L1",
                "run_mode": "degraded",
            })
        );
    }

    #[test]
    fn compact_marks_non_json_bodies() {
        assert_eq!(
            compact_response(502, None),
            json!({"status_code": 502, "json": false})
        );
    }

    #[test]
    fn compact_truncates_long_detail() {
        let body = json!({"detail": "x".repeat(1000)});
        let evidence = compact_response(424, Some(&body));
        let detail = evidence["detail"].as_str().expect("detail string");
        assert_eq!(detail.chars().count(), EVIDENCE_TEXT_LIMIT);
        assert!(detail.ends_with("..."));
    }

    #[test]
    fn structured_detail_requires_content() {
        assert_eq!(structured_detail(&json!({"detail": "boom"})), Some("boom".into()));
        assert!(structured_detail(&json!({"detail": {"code": "timeout"}})).is_some());
        assert_eq!(structured_detail(&json!({"detail": "  "})), None);
        assert_eq!(structured_detail(&json!({"detail": null})), None);
        assert_eq!(structured_detail(&json!({"detail": {}})), None);
        assert_eq!(structured_detail(&json!({"error": "boom"})), None);
    }
}
