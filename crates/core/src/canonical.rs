//! Canonical JSON encoding and SHA-256 hashing, implemented once here per
//! the design note in spec.md §9: any drift in key ordering, whitespace, or
//! number formatting between components would break ledger replay.
//!
//! Canonical form: UTF-8, object keys sorted ascending by byte value, no
//! whitespace between tokens, non-ASCII characters escaped as `\uXXXX`.

use sha2::{Digest, Sha256};
use serde_json::Value;

/// Render a [`Value`] into its canonical JSON string form.
#[must_use]
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// SHA-256 hex digest of a value's canonical JSON encoding.
#[must_use]
pub fn canonical_sha256_hex(value: &Value) -> String {
    let bytes = to_canonical_string(value).into_bytes();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped_string(key, out);
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

fn write_escaped_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7E => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(to_canonical_string(&v), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn no_whitespace_between_tokens() {
        let v = json!({"a": [1, 2, 3], "b": "x"});
        assert_eq!(to_canonical_string(&v), r#"{"a":[1,2,3],"b":"x"}"#);
    }

    #[test]
    fn escapes_non_ascii() {
        let v = json!({"name": "caf\u{e9}"});
        assert_eq!(to_canonical_string(&v), "{\"name\":\"caf\\u00e9\"}");
    }

    #[test]
    fn nested_objects_sort_recursively() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 1});
        assert_eq!(to_canonical_string(&v), r#"{"a":1,"z":{"x":2,"y":1}}"#);
    }

    #[test]
    fn hash_is_deterministic_regardless_of_input_key_order() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(canonical_sha256_hex(&a), canonical_sha256_hex(&b));
    }

    #[test]
    fn hash_changes_with_content() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(canonical_sha256_hex(&a), canonical_sha256_hex(&b));
    }

    #[test]
    fn hash_is_64_hex_chars() {
        let h = canonical_sha256_hex(&json!({"x": 1}));
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
