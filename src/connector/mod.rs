//! Connector boundary: the adapter contract for one storage engine.
//!
//! Production deployments implement [`Connector`] for their relational
//! store, search index, and vector store clients; those clients live
//! outside this crate. [`memory::MemoryConnector`] is the in-process
//! implementation used by tests and demos.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::job::SyncOperation;
use crate::record::DataRecord;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("connector call timed out: {0}")]
    Timeout(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Adapter to one storage engine.
///
/// Implementations must be safe for concurrent calls; the worker pool
/// invokes them from multiple tasks at once. `write_batch` and
/// `delete_batch` return the number of records the engine accepted,
/// which may be less than the batch size (partial success).
#[async_trait]
pub trait Connector: Send + Sync {
    /// Fetch records matching the opaque filter map.
    async fn fetch(&self, filters: &HashMap<String, Value>) -> Result<Vec<DataRecord>, ConnectorError>;

    /// Apply `operation` for the given records, returning the accepted count.
    async fn write_batch(
        &self,
        records: &[DataRecord],
        operation: SyncOperation,
    ) -> Result<usize, ConnectorError>;

    /// Remove records by id, returning the accepted count.
    async fn delete_batch(&self, record_ids: &[String]) -> Result<usize, ConnectorError>;

    /// Liveness probe. `Ok(true)` = healthy, `Ok(false)` = reachable but
    /// self-reporting unhealthy, `Err` = unreachable.
    async fn ping(&self) -> Result<bool, ConnectorError>;
}
