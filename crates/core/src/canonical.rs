//! Canonical JSON serialization and commit hashing.
//!
//! Commit ids are the SHA1 hex digest of a canonical JSON rendering of the
//! commit metadata. The canonical form mirrors the historical store so that
//! ids computed here match ids already persisted: object keys are sorted
//! lexicographically, items are joined with `", "`, keys and values with
//! `": "`, and non-ASCII characters are escaped as `\uXXXX`.
//!
//! The same serialization is used by the workspace lock enforcer for
//! structural equality, so equality is independent of key order.

use serde_json::Value;
use sha1::{Digest, Sha1};

/// Render `value` as canonical JSON.
///
/// Keys are sorted at every nesting level. Array order is preserved.
pub fn to_canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Compute the content hash of a commit.
///
/// The hash input is the canonical JSON of the four identity fields; every
/// reimplementation must reproduce this exact function to stay interoperable
/// with existing stored commits.
pub fn commit_hash(
    message: &str,
    parent_hash: Option<&str>,
    asset_snapshot: &Value,
    timestamp: &str,
) -> String {
    let content = serde_json::json!({
        "message": message,
        "parent_hash": parent_hash,
        "asset_snapshot": asset_snapshot,
        "timestamp": timestamp,
    });
    let canonical = to_canonical_json(&content);
    let mut hasher = Sha1::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Structural equality under canonical serialization.
pub fn canonically_equal(a: &Value, b: &Value) -> bool {
    to_canonical_json(a) == to_canonical_json(b)
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, &map[*key]);
            }
            out.push('}');
        }
    }
}

/// Escape a string the way the historical store did: standard JSON escapes
/// for quotes, backslashes and control characters, and `\uXXXX` (surrogate
/// pairs above the BMP) for everything outside printable ASCII.
fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{0c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (' '..='\u{7e}').contains(&c) => out.push(c),
            c => {
                let code = c as u32;
                if code < 0x10000 {
                    out.push_str(&format!("\\u{:04x}", code));
                } else {
                    let v = code - 0x10000;
                    let high = 0xd800 + (v >> 10);
                    let low = 0xdc00 + (v & 0x3ff);
                    out.push_str(&format!("\\u{:04x}\\u{:04x}", high, low));
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sorted_keys_and_separators() {
        let v = json!({"b": 1, "a": {"d": null, "c": [1, 2]}});
        assert_eq!(
            to_canonical_json(&v),
            r#"{"a": {"c": [1, 2], "d": null}, "b": 1}"#
        );
    }

    #[test]
    fn test_key_order_independence() {
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": {"k": true, "j": 2}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": {"j": 2, "k": true}, "x": 1}"#).unwrap();
        assert!(canonically_equal(&a, &b));
    }

    #[test]
    fn test_non_ascii_escaping() {
        let v = json!("héllo");
        assert_eq!(to_canonical_json(&v), "\"h\\u00e9llo\"");

        // Astral plane: surrogate pair.
        let v = json!("🎬");
        assert_eq!(to_canonical_json(&v), "\"\\ud83c\\udfac\"");
    }

    #[test]
    fn test_control_char_escaping() {
        let v = json!("a\nb\tc\"d\\e");
        assert_eq!(to_canonical_json(&v), r#""a\nb\tc\"d\\e""#);
    }

    #[test]
    fn test_commit_hash_deterministic() {
        let snapshot = json!({"a": "x"});
        let h1 = commit_hash("init", None, &snapshot, "2026-01-01T00:00:00.000000");
        let h2 = commit_hash("init", None, &snapshot, "2026-01-01T00:00:00.000000");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 40);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_commit_hash_changes_with_any_field() {
        let snapshot = json!({"a": "x"});
        let base = commit_hash("init", None, &snapshot, "2026-01-01T00:00:00.000000");

        assert_ne!(
            base,
            commit_hash("init2", None, &snapshot, "2026-01-01T00:00:00.000000")
        );
        assert_ne!(
            base,
            commit_hash("init", Some("abc"), &snapshot, "2026-01-01T00:00:00.000000")
        );
        assert_ne!(
            base,
            commit_hash("init", None, &json!({"a": "y"}), "2026-01-01T00:00:00.000000")
        );
        assert_ne!(
            base,
            commit_hash("init", None, &snapshot, "2026-01-01T00:00:00.000001")
        );
    }
}
