//! Canonical JSON serialization for artifact hashing
//!
//! Object keys are sorted recursively and output is compact, so the same
//! pipeline always hashes to the same BLAKE3 digest.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::Result;

/// Serialize a value to canonical JSON (sorted keys, no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    Ok(serde_json::to_string(&canonical)?)
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, canonicalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(elements) => Value::Array(elements.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// BLAKE3 digest of a canonical JSON string, hex encoded
pub fn hash_json_hex(json: &str) -> String {
    hex::encode(blake3::hash(json.as_bytes()).as_bytes())
}
