//! Argument extraction helpers shared by the tool domains.

use toolgate_core::{JsonMap, ToolError};

pub(crate) fn required_str<'a>(
    args: &'a JsonMap,
    key: &str,
    tool: &str,
) -> Result<&'a str, ToolError> {
    match args.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ToolError::InvalidArguments {
            name: tool.to_string(),
            reason: format!("'{key}' is required"),
        }),
    }
}

pub(crate) fn optional_str<'a>(args: &'a JsonMap, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Numeric argument with a default. Zero and negative values fall back
/// to the default, mirroring how absent fields behave.
pub(crate) fn optional_u64(args: &JsonMap, key: &str, default: u64) -> u64 {
    args.get(key)
        .and_then(|v| v.as_u64())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

pub(crate) fn optional_bool(args: &JsonMap, key: &str, default: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Truncate to at most `max_bytes`, backing off to a char boundary.
/// Returns the (possibly shortened) text and whether truncation happened.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> (String, bool) {
    if s.len() <= max_bytes {
        return (s.to_string(), false);
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    (s[..end].to_string(), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: serde_json::Value) -> JsonMap {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn required_str_present() {
        let args = obj(json!({"path": "notes.txt"}));
        assert_eq!(required_str(&args, "path", "files.read").unwrap(), "notes.txt");
    }

    #[test]
    fn required_str_missing_or_blank() {
        let args = obj(json!({"path": "  "}));
        let err = required_str(&args, "path", "files.read").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert!(required_str(&obj(json!({})), "path", "files.read").is_err());
    }

    #[test]
    fn optional_u64_zero_falls_back() {
        let args = obj(json!({"max_bytes": 0}));
        assert_eq!(optional_u64(&args, "max_bytes", 20_000), 20_000);
        let args = obj(json!({"max_bytes": 64}));
        assert_eq!(optional_u64(&args, "max_bytes", 20_000), 64);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let (out, truncated) = truncate_utf8("héllo", 2);
        assert!(truncated);
        assert_eq!(out, "h"); // 'é' is two bytes, cut before it
        let (out, truncated) = truncate_utf8("short", 100);
        assert!(!truncated);
        assert_eq!(out, "short");
    }
}
