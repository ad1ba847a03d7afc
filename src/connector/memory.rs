//! In-memory connector for tests and demos.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::{Connector, ConnectorError};
use crate::job::SyncOperation;
use crate::record::DataRecord;

/// DashMap-backed [`Connector`] with failure injection.
///
/// Filter semantics for `fetch`:
/// - `record_id` (string) / `record_ids` (array of strings): id selection
/// - `data_type` (string): exact match
/// - `updated_since` (integer epoch millis): strictly newer records
/// - any other key: equality against the same key in record content
///
/// The failure toggles (`set_fail_pings`, `set_fail_writes`, ...) let tests
/// simulate outages, slow engines, and partial batch acceptance without a
/// real backend.
pub struct MemoryConnector {
    engine: String,
    records: DashMap<String, DataRecord>,
    fail_pings: AtomicBool,
    report_unhealthy: AtomicBool,
    fail_fetches: AtomicBool,
    fail_writes: AtomicBool,
    write_delay_ms: AtomicU64,
    /// Accept at most this many records per write batch (0 = no limit).
    partial_write_limit: AtomicUsize,
    write_batches: AtomicUsize,
    active_writes: AtomicUsize,
    max_concurrent_writes: AtomicUsize,
}

impl MemoryConnector {
    #[must_use]
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            records: DashMap::new(),
            fail_pings: AtomicBool::new(false),
            report_unhealthy: AtomicBool::new(false),
            fail_fetches: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            write_delay_ms: AtomicU64::new(0),
            partial_write_limit: AtomicUsize::new(0),
            write_batches: AtomicUsize::new(0),
            active_writes: AtomicUsize::new(0),
            max_concurrent_writes: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Seed a record directly, bypassing the sync path.
    pub fn seed(&self, record: DataRecord) {
        self.records.insert(record.record_id.clone(), record);
    }

    #[must_use]
    pub fn get(&self, record_id: &str) -> Option<DataRecord> {
        self.records.get(record_id).map(|r| r.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    /// Number of `write_batch`/`delete_batch` calls observed.
    #[must_use]
    pub fn write_batches(&self) -> usize {
        self.write_batches.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping write calls observed.
    #[must_use]
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_concurrent_writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_pings(&self, fail: bool) {
        self.fail_pings.store(fail, Ordering::SeqCst);
    }

    /// Make `ping` return `Ok(false)` (reachable but unhealthy).
    pub fn set_report_unhealthy(&self, unhealthy: bool) {
        self.report_unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_partial_write_limit(&self, limit: usize) {
        self.partial_write_limit.store(limit, Ordering::SeqCst);
    }

    fn matches(&self, record: &DataRecord, filters: &HashMap<String, Value>) -> bool {
        for (key, value) in filters {
            let ok = match key.as_str() {
                "record_id" => value.as_str() == Some(record.record_id.as_str()),
                "record_ids" => value
                    .as_array()
                    .is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(&record.record_id))),
                "data_type" => value.as_str() == Some(record.data_type.as_str()),
                "updated_since" => value.as_i64().is_some_and(|ts| record.updated_at > ts),
                field => record.content.get(field) == Some(value),
            };
            if !ok {
                return false;
            }
        }
        true
    }

    async fn enter_write(&self) -> Result<(), ConnectorError> {
        self.write_batches.fetch_add(1, Ordering::SeqCst);
        let active = self.active_writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_writes.fetch_max(active, Ordering::SeqCst);

        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_writes.load(Ordering::SeqCst) {
            self.active_writes.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectorError::Backend(format!(
                "{}: injected write failure",
                self.engine
            )));
        }
        Ok(())
    }

    fn leave_write(&self) {
        self.active_writes.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn fetch(&self, filters: &HashMap<String, Value>) -> Result<Vec<DataRecord>, ConnectorError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(ConnectorError::Backend(format!(
                "{}: injected fetch failure",
                self.engine
            )));
        }
        let mut records: Vec<DataRecord> = self
            .records
            .iter()
            .filter(|r| self.matches(r.value(), filters))
            .map(|r| r.value().clone())
            .collect();
        // Stable order keeps batch composition deterministic
        records.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        Ok(records)
    }

    async fn write_batch(
        &self,
        records: &[DataRecord],
        _operation: SyncOperation,
    ) -> Result<usize, ConnectorError> {
        self.enter_write().await?;

        let limit = self.partial_write_limit.load(Ordering::SeqCst);
        let accepted = if limit > 0 { records.len().min(limit) } else { records.len() };

        for record in &records[..accepted] {
            self.records.insert(record.record_id.clone(), record.clone());
        }

        self.leave_write();
        Ok(accepted)
    }

    async fn delete_batch(&self, record_ids: &[String]) -> Result<usize, ConnectorError> {
        self.enter_write().await?;

        let mut deleted = 0;
        for id in record_ids {
            if self.records.remove(id).is_some() {
                deleted += 1;
            }
        }

        self.leave_write();
        Ok(deleted)
    }

    async fn ping(&self) -> Result<bool, ConnectorError> {
        if self.fail_pings.load(Ordering::SeqCst) {
            return Err(ConnectorError::Unavailable(format!(
                "{}: injected ping failure",
                self.engine
            )));
        }
        Ok(!self.report_unhealthy.load(Ordering::SeqCst))
    }
}
