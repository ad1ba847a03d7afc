//! Public types for the sync service.

use serde::Serialize;
use std::collections::HashMap;

use crate::job::JobStatus;
use crate::registry::ConnectorStatus;

/// Point-in-time statistics snapshot.
///
/// All figures are in-memory and process-scoped; nothing here survives a
/// restart. Produced by
/// [`get_sync_statistics`](crate::SyncService::get_sync_statistics).
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatistics {
    /// Jobs currently executing on a worker.
    pub active_jobs: usize,
    /// Jobs submitted but not yet dequeued.
    pub queued_jobs: usize,
    /// Job results currently tracked (bounded by retention cleanup).
    pub total_jobs: usize,
    /// Tracked jobs grouped by status.
    pub status_counts: HashMap<JobStatus, usize>,
    /// Status of every registered connector.
    pub connectors: Vec<ConnectorStatus>,
    /// Entries in the checksum index across all target engines.
    pub tracked_checksums: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes() {
        let stats = SyncStatistics {
            active_jobs: 1,
            queued_jobs: 2,
            total_jobs: 3,
            status_counts: HashMap::from([(JobStatus::Completed, 3)]),
            connectors: Vec::new(),
            tracked_checksums: 42,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"completed\":3"));
        assert!(json.contains("\"tracked_checksums\":42"));
    }
}
