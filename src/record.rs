//! Record data structure.
//!
//! The [`DataRecord`] is the unit of data that flows between storage engines.
//! Records are immutable value objects, recreated on every fetch; the content
//! checksum is computed once at construction from the canonicalized payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checksum::content_hash;

/// Current time as epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A single record fetched from a source engine.
///
/// # Example
///
/// ```
/// use index_sync::DataRecord;
/// use serde_json::json;
///
/// let record = DataRecord::new(
///     "doc-42".into(),
///     "document".into(),
///     json!({"title": "Hello", "body": "World"}),
///     "primary".into(),
/// );
///
/// assert_eq!(record.record_id, "doc-42");
/// assert_eq!(record.checksum.len(), 64); // hex SHA-256
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRecord {
    /// Unique record identifier within its data type
    pub record_id: String,
    /// Logical data type (e.g. "document", "chunk", "derived_value")
    pub data_type: String,
    /// The actual payload
    pub content: Value,
    /// Hex SHA-256 of the canonicalized content
    pub checksum: String,
    /// Last update timestamp (epoch millis)
    pub updated_at: i64,
    /// Engine the record was fetched from
    pub source_engine: String,
}

impl DataRecord {
    /// Create a new record, computing its content checksum.
    pub fn new(record_id: String, data_type: String, content: Value, source_engine: String) -> Self {
        let checksum = content_hash(&content);
        Self {
            record_id,
            data_type,
            content,
            checksum,
            updated_at: now_millis(),
            source_engine,
        }
    }

    /// Create a record with an explicit timestamp (used when the source
    /// engine reports its own modification time).
    pub fn with_timestamp(
        record_id: String,
        data_type: String,
        content: Value,
        source_engine: String,
        updated_at: i64,
    ) -> Self {
        let mut record = Self::new(record_id, data_type, content, source_engine);
        record.updated_at = updated_at;
        record
    }

    /// Rebuild this record with new content (new checksum, new timestamp).
    #[must_use]
    pub fn replace_content(&self, content: Value) -> Self {
        Self::new(
            self.record_id.clone(),
            self.data_type.clone(),
            content,
            self.source_engine.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_record() {
        let record = DataRecord::new(
            "r-1".to_string(),
            "document".to_string(),
            json!({"key": "value"}),
            "primary".to_string(),
        );

        assert_eq!(record.record_id, "r-1");
        assert_eq!(record.data_type, "document");
        assert_eq!(record.source_engine, "primary");
        assert!(record.updated_at > 0);
        assert_eq!(record.checksum.len(), 64);
    }

    #[test]
    fn test_checksum_matches_content() {
        let a = DataRecord::new("r".into(), "t".into(), json!({"a": 1}), "e".into());
        let b = DataRecord::new("r".into(), "t".into(), json!({"a": 1}), "e".into());
        let c = DataRecord::new("r".into(), "t".into(), json!({"a": 2}), "e".into());

        assert_eq!(a.checksum, b.checksum);
        assert_ne!(a.checksum, c.checksum);
    }

    #[test]
    fn test_with_timestamp() {
        let record = DataRecord::with_timestamp(
            "r".into(),
            "t".into(),
            json!({}),
            "e".into(),
            1_700_000_000_000,
        );
        assert_eq!(record.updated_at, 1_700_000_000_000);
    }

    #[test]
    fn test_replace_content_recomputes_checksum() {
        let record = DataRecord::new("r".into(), "t".into(), json!({"v": 1}), "e".into());
        let replaced = record.replace_content(json!({"v": 2}));

        assert_eq!(replaced.record_id, record.record_id);
        assert_ne!(replaced.checksum, record.checksum);
    }

    #[test]
    fn test_serialize_deserialize() {
        let record = DataRecord::new(
            "r-1".to_string(),
            "chunk".to_string(),
            json!({"nested": {"key": "value"}, "array": [1, 2, 3]}),
            "primary".to_string(),
        );

        let json_str = serde_json::to_string(&record).unwrap();
        let deserialized: DataRecord = serde_json::from_str(&json_str).unwrap();

        assert_eq!(deserialized.record_id, record.record_id);
        assert_eq!(deserialized.checksum, record.checksum);
        assert_eq!(deserialized.content, record.content);
    }
}
