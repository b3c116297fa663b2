//! Dataset fingerprinting
//!
//! Computes a deterministic SHA-256 fingerprint over a set of rows. The
//! encoding re-sorts object keys recursively, so two datasets with the
//! same values under different key orders produce the same fingerprint.

use sha2::{Digest, Sha256};

use crate::dataset::Row;

/// Hex-encoded SHA-256 fingerprint of the rows, independent of the key
/// order within each row.
pub fn fingerprint_rows(rows: &[Row]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        let canonical = canonicalize(&serde_json::Value::Object(row.clone()));
        hasher.update(canonical.as_bytes());
        // Record separator keeps [{"a":1},{"b":2}] distinct from [{"a":1,"b":2}]
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}

/// Serialized size in bytes of the rows as a JSON array.
pub fn serialized_size(rows: &[Row]) -> u64 {
    let value = serde_json::Value::Array(
        rows.iter()
            .map(|r| serde_json::Value::Object(r.clone()))
            .collect(),
    );
    serde_json::to_vec(&value).map(|v| v.len() as u64).unwrap_or(0)
}

fn canonicalize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        canonicalize(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        serde_json::Value::Array(items) => {
            let elems: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", elems.join(","))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
