// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Conflict resolution between source and target record state.
//!
//! Resolution runs after change detection, on records that would be written.
//! Target-side state comes from a single fetch against the target connector
//! with the job's filters, keyed by record id; a missing entry means the
//! target has no competing state and the source value is pushed.

use serde_json::Value;

use crate::job::ConflictStrategy;
use crate::record::DataRecord;

/// Outcome of resolving one record.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Write this record to the target.
    Write(DataRecord),
    /// Target state stands; count the record as skipped.
    Skip,
    /// Strategy is `Manual` and a conflict exists; the job must be parked.
    NeedsManual,
}

impl Resolution {
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}

/// Resolve a source record against the target's current state, if any.
#[must_use]
pub fn resolve(
    strategy: ConflictStrategy,
    source: &DataRecord,
    target: Option<&DataRecord>,
) -> Resolution {
    match strategy {
        ConflictStrategy::SourceWins => Resolution::Write(source.clone()),
        ConflictStrategy::TargetWins => match target {
            // Any divergent target state stands; only fill gaps
            Some(t) if t.checksum != source.checksum => Resolution::Skip,
            _ => Resolution::Write(source.clone()),
        },
        ConflictStrategy::LatestWins => match target {
            // The source must be strictly newer; a tie is not newer
            Some(t) if t.updated_at >= source.updated_at => Resolution::Skip,
            _ => Resolution::Write(source.clone()),
        },
        ConflictStrategy::Merge => match target {
            Some(t) => Resolution::Write(source.replace_content(merge_content(
                &t.content,
                &source.content,
            ))),
            None => Resolution::Write(source.clone()),
        },
        ConflictStrategy::Manual => match target {
            Some(t) if t.checksum != source.checksum => Resolution::NeedsManual,
            _ => Resolution::Write(source.clone()),
        },
    }
}

/// Field-level merge: start from the target's fields, overlay the source's.
/// Source fields take precedence on key collision; non-object payloads fall
/// back to the source value wholesale.
fn merge_content(target: &Value, source: &Value) -> Value {
    match (target, source) {
        (Value::Object(t), Value::Object(s)) => {
            let mut merged = t.clone();
            for (key, value) in s {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => source.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, content: Value, updated_at: i64) -> DataRecord {
        DataRecord::with_timestamp(
            id.into(),
            "document".into(),
            content,
            "primary".into(),
            updated_at,
        )
    }

    #[test]
    fn test_source_wins_ignores_target() {
        let source = record("r", json!({"v": 1}), 100);
        let target = record("r", json!({"v": 2}), 999);

        let res = resolve(ConflictStrategy::SourceWins, &source, Some(&target));
        assert!(res.is_write());
    }

    #[test]
    fn test_target_wins_preserves_divergent_target() {
        let source = record("r", json!({"v": 1}), 100);
        let divergent = record("r", json!({"v": 2}), 50);
        let identical = record("r", json!({"v": 1}), 50);

        assert!(matches!(
            resolve(ConflictStrategy::TargetWins, &source, Some(&divergent)),
            Resolution::Skip
        ));
        // Identical or absent target state is just filled in
        assert!(resolve(ConflictStrategy::TargetWins, &source, Some(&identical)).is_write());
        assert!(resolve(ConflictStrategy::TargetWins, &source, None).is_write());
    }

    #[test]
    fn test_latest_wins_ties_preserve_target() {
        let source = record("r", json!({"v": 1}), 100);
        let same_age = record("r", json!({"v": 2}), 100);

        assert!(matches!(
            resolve(ConflictStrategy::LatestWins, &source, Some(&same_age)),
            Resolution::Skip
        ));
        // A strictly older target is overwritten
        let older = record("r", json!({"v": 2}), 99);
        assert!(resolve(ConflictStrategy::LatestWins, &source, Some(&older)).is_write());
    }

    #[test]
    fn test_latest_wins_skips_newer_target() {
        let source = record("r", json!({"v": 1}), 100);
        let newer = record("r", json!({"v": 2}), 101);

        assert!(matches!(
            resolve(ConflictStrategy::LatestWins, &source, Some(&newer)),
            Resolution::Skip
        ));
    }

    #[test]
    fn test_merge_overlays_source_fields() {
        let source = record("r", json!({"title": "new", "body": "text"}), 100);
        let target = record("r", json!({"title": "old", "tags": ["a"]}), 50);

        match resolve(ConflictStrategy::Merge, &source, Some(&target)) {
            Resolution::Write(merged) => {
                assert_eq!(merged.content["title"], "new");
                assert_eq!(merged.content["body"], "text");
                assert_eq!(merged.content["tags"], json!(["a"]));
                // Checksum reflects merged content
                assert_ne!(merged.checksum, source.checksum);
            }
            other => panic!("expected write, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_non_object_falls_back_to_source() {
        let source = record("r", json!([1, 2]), 100);
        let target = record("r", json!({"a": 1}), 50);

        match resolve(ConflictStrategy::Merge, &source, Some(&target)) {
            Resolution::Write(r) => assert_eq!(r.content, json!([1, 2])),
            other => panic!("expected write, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_without_target_writes_source() {
        let source = record("r", json!({"v": 1}), 100);
        assert!(resolve(ConflictStrategy::Merge, &source, None).is_write());
    }

    #[test]
    fn test_manual_needs_resolution_on_divergence() {
        let source = record("r", json!({"v": 1}), 100);
        let divergent = record("r", json!({"v": 2}), 50);

        assert!(matches!(
            resolve(ConflictStrategy::Manual, &source, Some(&divergent)),
            Resolution::NeedsManual
        ));
    }

    #[test]
    fn test_manual_writes_when_no_conflict() {
        let source = record("r", json!({"v": 1}), 100);
        let identical = record("r", json!({"v": 1}), 50);

        assert!(resolve(ConflictStrategy::Manual, &source, None).is_write());
        assert!(resolve(ConflictStrategy::Manual, &source, Some(&identical)).is_write());
    }
}
