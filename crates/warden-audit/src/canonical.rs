// canonical.rs — Canonical JSON serialization.
//
// Hashing JSON is only meaningful if the serialization is deterministic:
// same value, same bytes. Canonical form here means object keys sorted
// lexicographically at every depth, compact separators (no insignificant
// whitespace), and UTF-8 output. Entry hashes, args digests, and the
// bootstrap HMAC payload all go through this module.

use serde_json::{Map, Value};

use crate::hasher;

/// Serialize a JSON value canonically: sorted keys, no extra whitespace.
pub fn canonical_json(value: &Value) -> String {
    // serde_json emits compact output by default; sorting is ours to do.
    serde_json::to_string(&sort_value(value)).unwrap_or_else(|_| "null".to_string())
}

/// SHA-256 digest of the canonical serialization of `value`.
///
/// This is the `args_digest` recorded in every audit entry.
pub fn args_digest(value: &Value) -> String {
    hasher::hash_str(&canonical_json(value))
}

/// Rebuild a value with all object keys in sorted order, recursively.
fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                // Key is present by construction.
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_value(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}
