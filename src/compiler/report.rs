//! Projection of the compiler's JSON report
//!
//! Only `path`, `type` and `title` are ever forwarded to the queue; the full
//! report is uploaded separately.

use eco_protocol::CompileReport;
use serde_json::Value;

/// Marker appended to a field cut at the length cap.
pub const TRUNCATION_MARKER: &str = "...";

/// Project a raw `--report=json` stream onto the whitelisted fields.
///
/// Text that is not a JSON object yields the decode-failure placeholder.
/// String values longer than `max_chars` characters are cut.
pub fn project_report(raw: &str, max_chars: usize) -> CompileReport {
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(raw.trim()) else {
        return CompileReport::decode_failure();
    };

    let field = |key: &str| -> Option<String> {
        match object.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(truncate_chars(s, max_chars)),
            other => Some(truncate_chars(&other.to_string(), max_chars)),
        }
    };

    CompileReport {
        path: field("path"),
        kind: field("type"),
        title: field("title"),
        error: None,
    }
}

/// Report attached when the compiler was killed at the timeout.
pub fn timeout_report() -> CompileReport {
    CompileReport {
        kind: Some("timeout".to_string()),
        title: Some("COMPILER TIMED OUT".to_string()),
        ..CompileReport::default()
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max_chars).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_projects_whitelisted_fields_only() {
        let raw = json!({
            "type": "error",
            "path": "src/Foo.elm",
            "title": "UNKNOWN IMPORT",
            "message": ["The Foo module has a bad import:", {"bold": true, "string": "import Baz"}],
            "errors": [{"path": "src/Foo.elm", "problems": []}]
        })
        .to_string();

        let report = project_report(&raw, 1024);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({"path": "src/Foo.elm", "type": "error", "title": "UNKNOWN IMPORT"})
        );
    }

    #[test]
    fn test_compile_errors_report_keeps_type_only() {
        let raw = r#"{"type":"compile-errors","errors":[{"path":"src/A.elm","name":"A","problems":[]}]}"#;
        let report = project_report(raw, 1024);
        assert_eq!(report.kind.as_deref(), Some("compile-errors"));
        assert_eq!(report.path, None);
        assert_eq!(report.title, None);
    }

    #[test]
    fn test_null_path_is_absent() {
        let report = project_report(r#"{"type":"error","path":null,"title":"NO elm.json FILE"}"#, 64);
        assert_eq!(report.path, None);
        assert_eq!(report.title.as_deref(), Some("NO elm.json FILE"));
    }

    #[test]
    fn test_decode_failure() {
        for raw in ["", "Segmentation fault", "[1,2,3]", "{\"type\": "] {
            assert_eq!(project_report(raw, 64), CompileReport::decode_failure(), "{raw:?}");
        }
    }

    #[test]
    fn test_fields_are_truncated() {
        let long = "x".repeat(100);
        let raw = json!({"type": "error", "title": long}).to_string();
        let report = project_report(&raw, 10);
        assert_eq!(report.title.as_deref(), Some("xxxxxxxxxx..."));
        assert_eq!(report.kind.as_deref(), Some("error"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("ééééé", 2), "éé...");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn test_timeout_report() {
        let value = serde_json::to_value(timeout_report()).unwrap();
        assert_eq!(value, json!({"type": "timeout", "title": "COMPILER TIMED OUT"}));
    }
}
