//! Cache-Key Function
//!
//! A deterministic digest of `(tool name, arguments)` with canonicalized
//! key ordering, so that two argument objects differing only in key order
//! hash identically. Mirrored in the emitted in-sandbox runtime; this
//! host-side copy is the one the host trusts when it recomputes a cache
//! entry rather than relying on the sandbox's own claim.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Render `value` as JSON text with object keys sorted recursively, so
/// structurally identical objects always serialize identically regardless
/// of insertion order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&serde_json::to_string(s).expect("string always serializes")),
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
                out.push_str(&serde_json::to_string(key).expect("string always serializes"));
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

/// `SHA-256(tool + ":" + canonicalJSON(args))`, hex-encoded.
pub fn cache_key(tool: &str, args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool.as_bytes());
    hasher.update(b":");
    hasher.update(canonical_json(args).as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
