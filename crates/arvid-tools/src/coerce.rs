// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Permissive argument extraction.
//!
//! Models emit arguments in several shapes: plain typed JSON, the wrapped
//! form `{"type": "string", "value": "x"}`, and string-encoded scalars
//! (`"3"` for 3).  One coercion helper keeps every tool from reinventing
//! the unwrapping.

use serde_json::Value;

/// Unwrap the `{"value": ...}` / `{"type": ..., "value": ...}` shape some
/// providers emit; any other value passes through.
fn unwrap_value(v: &Value) -> &Value {
    if let Value::Object(map) = v {
        if let Some(inner) = map.get("value") {
            return inner;
        }
    }
    v
}

/// Extract a string argument.  Numbers and booleans stringify.
pub fn arg_str(args: &Value, key: &str) -> Option<String> {
    let v = unwrap_value(args.get(key)?);
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Extract an unsigned integer argument; accepts string-encoded digits.
pub fn arg_u32(args: &Value, key: &str) -> Option<u32> {
    let v = unwrap_value(args.get(key)?);
    match v {
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extract a boolean argument; accepts `"true"` / `"false"` strings.
pub fn arg_bool(args: &Value, key: &str) -> Option<bool> {
    let v = unwrap_value(args.get(key)?);
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_string_extracted() {
        let args = json!({ "query": "hello" });
        assert_eq!(arg_str(&args, "query"), Some("hello".into()));
    }

    #[test]
    fn wrapped_string_unwrapped() {
        let args = json!({ "query": { "type": "string", "value": "hello" } });
        assert_eq!(arg_str(&args, "query"), Some("hello".into()));
    }

    #[test]
    fn bare_value_wrapper_unwrapped() {
        let args = json!({ "query": { "value": "hi there" } });
        assert_eq!(arg_str(&args, "query"), Some("hi there".into()));
    }

    #[test]
    fn number_stringifies() {
        let args = json!({ "id": 42 });
        assert_eq!(arg_str(&args, "id"), Some("42".into()));
    }

    #[test]
    fn missing_key_is_none() {
        assert_eq!(arg_str(&json!({}), "query"), None);
    }

    #[test]
    fn u32_from_number_and_string() {
        assert_eq!(arg_u32(&json!({ "n": 3 }), "n"), Some(3));
        assert_eq!(arg_u32(&json!({ "n": "3" }), "n"), Some(3));
        assert_eq!(arg_u32(&json!({ "n": { "value": "7" } }), "n"), Some(7));
        assert_eq!(arg_u32(&json!({ "n": "x" }), "n"), None);
    }

    #[test]
    fn bool_from_bool_and_string() {
        assert_eq!(arg_bool(&json!({ "b": true }), "b"), Some(true));
        assert_eq!(arg_bool(&json!({ "b": "false" }), "b"), Some(false));
        assert_eq!(arg_bool(&json!({ "b": 1 }), "b"), None);
    }

    #[test]
    fn negative_number_not_a_u32() {
        assert_eq!(arg_u32(&json!({ "n": -2 }), "n"), None);
    }
}
