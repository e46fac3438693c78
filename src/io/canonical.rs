//! Canonical JSON and content digests.
//!
//! `canonical_json` recursively sorts object keys (lexicographically) while
//! preserving array order, so that two JSON values that differ only in key
//! order serialize identically. `sha256_digest_json` hashes that canonical
//! form — this is what the specification calls an "inputs digest".

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Recursively sort object keys; arrays keep their element order.
pub fn canonical_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), canonical_json(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_json).collect()),
        other => other.clone(),
    }
}

/// Hex-encoded SHA-256 digest of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `"sha256:" + hex(sha256(canonical_json(value)))`.
pub fn sha256_digest_json(value: &Value) -> String {
    let canon = canonical_json(value);
    // serde_json's compact writer is deterministic for a given Value tree;
    // combined with the key sort above this gives a stable byte sequence.
    let bytes = serde_json::to_vec(&canon).expect("canonical json always serializes");
    format!("sha256:{}", sha256_hex(&bytes))
}
