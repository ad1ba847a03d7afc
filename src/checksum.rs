// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Content checksums and the per-engine checksum index.
//!
//! Change detection hashes a canonical serialization of record content and
//! compares it against the last hash synced to a given target engine. The
//! canonical form is an explicit contract: object keys are sorted
//! lexicographically at every nesting depth, scalars use serde_json's stable
//! itoa/ryu formatting, and no insignificant whitespace is emitted. Two
//! payloads that differ only in key order hash identically.
//!
//! # Example
//!
//! ```
//! use index_sync::checksum::content_hash;
//! use serde_json::json;
//!
//! let a = content_hash(&json!({"b": 2, "a": 1}));
//! let b = content_hash(&json!({"a": 1, "b": 2}));
//! assert_eq!(a, b);
//! ```

use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::record::DataRecord;

/// Serialize a JSON value into its canonical byte form.
///
/// Objects are emitted with keys in lexicographic order, recursively.
/// Numbers, strings, booleans and null are rendered through serde_json,
/// whose integer/float formatting is stable across platforms.
#[must_use]
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                // Keys are JSON strings, escaped the same way as values
                out.extend_from_slice(
                    serde_json::to_string(key).unwrap_or_default().as_bytes(),
                );
                out.push(b':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        scalar => {
            out.extend_from_slice(
                serde_json::to_string(scalar).unwrap_or_default().as_bytes(),
            );
        }
    }
}

/// Hex SHA-256 of the canonical form of `value`.
#[must_use]
pub fn content_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(value));
    hex::encode(hasher.finalize())
}

/// Per-target-engine map of record id to last-synced content hash.
///
/// Each target engine owns an isolated key space; hashes recorded for one
/// engine never affect change detection for another. Entries are advanced
/// strictly after the target connector accepted the write (write-then-record).
#[derive(Debug, Default)]
pub struct ChecksumIndex {
    engines: DashMap<String, Arc<DashMap<String, String>>>,
}

impl ChecksumIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            engines: DashMap::new(),
        }
    }

    fn engine_map(&self, engine: &str) -> Arc<DashMap<String, String>> {
        self.engines
            .entry(engine.to_string())
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone()
    }

    /// Last hash synced to `engine` for `record_id`, if any.
    #[must_use]
    pub fn last_synced(&self, engine: &str, record_id: &str) -> Option<String> {
        self.engines
            .get(engine)
            .and_then(|m| m.get(record_id).map(|h| h.clone()))
    }

    /// Whether `record` differs from what was last synced to `engine`.
    ///
    /// Absent or different hash means changed; identical means the record
    /// can be skipped.
    #[must_use]
    pub fn is_changed(&self, engine: &str, record: &DataRecord) -> bool {
        match self.last_synced(engine, &record.record_id) {
            Some(hash) => hash != record.checksum,
            None => true,
        }
    }

    /// Record that `record_id` was durably written to `engine` with `hash`.
    pub fn record_synced(&self, engine: &str, record_id: &str, hash: &str) {
        self.engine_map(engine)
            .insert(record_id.to_string(), hash.to_string());
    }

    /// Drop the entry for a deleted record.
    pub fn forget(&self, engine: &str, record_id: &str) {
        if let Some(map) = self.engines.get(engine) {
            map.remove(record_id);
        }
    }

    /// Number of records tracked for one engine.
    #[must_use]
    pub fn tracked(&self, engine: &str) -> usize {
        self.engines.get(engine).map_or(0, |m| m.len())
    }

    /// Number of records tracked across all engines.
    #[must_use]
    pub fn total_tracked(&self) -> usize {
        self.engines.iter().map(|e| e.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_key_order_invariant() {
        let a = json!({"z": 1, "a": {"c": true, "b": [1, 2]}});
        let b = json!({"a": {"b": [1, 2], "c": true}, "z": 1});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_canonical_array_order_significant() {
        assert_ne!(
            content_hash(&json!([1, 2, 3])),
            content_hash(&json!([3, 2, 1]))
        );
    }

    #[test]
    fn test_canonical_scalars() {
        assert_eq!(canonical_bytes(&json!(null)), b"null");
        assert_eq!(canonical_bytes(&json!(true)), b"true");
        assert_eq!(canonical_bytes(&json!(42)), b"42");
        assert_eq!(canonical_bytes(&json!("hi")), b"\"hi\"");
    }

    #[test]
    fn test_canonical_escapes_keys() {
        let value = json!({"a\"b": 1});
        let bytes = canonical_bytes(&value);
        assert_eq!(bytes, br#"{"a\"b":1}"#);
    }

    #[test]
    fn test_canonical_no_whitespace() {
        let bytes = canonical_bytes(&json!({"a": [1, {"b": 2}]}));
        assert_eq!(bytes, br#"{"a":[1,{"b":2}]}"#);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = content_hash(&json!({}));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    fn record(id: &str, content: serde_json::Value) -> DataRecord {
        DataRecord::new(id.into(), "document".into(), content, "primary".into())
    }

    #[test]
    fn test_absent_entry_is_changed() {
        let index = ChecksumIndex::new();
        assert!(index.is_changed("search", &record("r-1", json!({"v": 1}))));
    }

    #[test]
    fn test_recorded_entry_is_unchanged() {
        let index = ChecksumIndex::new();
        let r = record("r-1", json!({"v": 1}));

        index.record_synced("search", &r.record_id, &r.checksum);
        assert!(!index.is_changed("search", &r));

        // Different content is changed again
        let r2 = record("r-1", json!({"v": 2}));
        assert!(index.is_changed("search", &r2));
    }

    #[test]
    fn test_engines_are_isolated() {
        let index = ChecksumIndex::new();
        let r = record("r-1", json!({"v": 1}));

        index.record_synced("search", &r.record_id, &r.checksum);

        assert!(!index.is_changed("search", &r));
        assert!(index.is_changed("vector", &r), "other engine key space untouched");
        assert_eq!(index.tracked("search"), 1);
        assert_eq!(index.tracked("vector"), 0);
    }

    #[test]
    fn test_forget() {
        let index = ChecksumIndex::new();
        let r = record("r-1", json!({"v": 1}));

        index.record_synced("search", &r.record_id, &r.checksum);
        index.forget("search", &r.record_id);

        assert!(index.is_changed("search", &r));
        assert_eq!(index.total_tracked(), 0);
    }

    #[test]
    fn test_total_tracked() {
        let index = ChecksumIndex::new();
        index.record_synced("search", "a", "h1");
        index.record_synced("search", "b", "h2");
        index.record_synced("vector", "a", "h3");
        assert_eq!(index.total_tracked(), 3);
    }
}
