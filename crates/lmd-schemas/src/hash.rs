//! Canonical-JSON hashing shared by listing field hashes and config hashes.
//!
//! Canonicalization recursively sorts object keys so that two JSON values with
//! the same keys and values, independent of insertion order, hash identically.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Recursively sort the keys of every object nested in `value`.
pub fn canonicalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: std::collections::BTreeMap<String, Value> =
                std::collections::BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k.clone(), canonicalize_json(v));
            }
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize_json).collect()),
        other => other.clone(),
    }
}

/// Serialize `value` with sorted keys and return the hex SHA-256 digest of
/// the resulting compact bytes.
pub fn sha256_hex_of(value: &Value) -> String {
    let canonical = canonicalize_json(value);
    let bytes = serde_json::to_vec(&canonical).expect("canonical json never fails to serialize");
    let digest = Sha256::digest(&bytes);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = json!({"price": 100, "title": "X"});
        let b = json!({"title": "X", "price": 100});
        assert_eq!(sha256_hex_of(&a), sha256_hex_of(&b));
    }

    #[test]
    fn differing_values_hash_differently() {
        let a = json!({"price": 100});
        let b = json!({"price": 80});
        assert_ne!(sha256_hex_of(&a), sha256_hex_of(&b));
    }
}
