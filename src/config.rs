//! Configuration for the sync service.
//!
//! # Example
//!
//! ```
//! use index_sync::SyncServiceConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SyncServiceConfig::default();
//! assert_eq!(config.max_concurrent_jobs, 5);
//!
//! // Full config
//! let config = SyncServiceConfig {
//!     max_concurrent_jobs: 8,
//!     heartbeat_interval_ms: 10_000,
//!     max_job_history: 500,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// Configuration for the sync service.
///
/// All fields have sensible defaults. The per-job defaults
/// (`default_batch_size`, `default_max_retries`, ...) seed new
/// [`SyncJobConfig`](crate::SyncJobConfig) values built by the
/// convenience wrappers.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncServiceConfig {
    /// Number of concurrent sync workers (default: 5)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Bounded job queue capacity (default: 1000)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long a worker blocks on an empty queue before re-checking
    /// for shutdown (default: 500 ms)
    #[serde(default = "default_dequeue_timeout_ms")]
    pub dequeue_timeout_ms: u64,

    /// Connector heartbeat interval (default: 30 s)
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Job history cleanup interval (default: 5 min)
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Retention window for terminal job results (default: 1 h)
    #[serde(default = "default_job_retention_ms")]
    pub job_retention_ms: u64,

    /// Hard cap on retained job results (default: 1000)
    #[serde(default = "default_max_job_history")]
    pub max_job_history: usize,

    /// Default records per write batch (default: 100)
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    /// Default retry attempts before a job fails terminally (default: 3)
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// Default base retry delay, doubled per attempt (default: 1 s)
    #[serde(default = "default_retry_delay_ms")]
    pub default_retry_delay_ms: u64,

    /// Default per-job execution timeout (default: 5 min)
    #[serde(default = "default_job_timeout_ms")]
    pub default_job_timeout_ms: u64,

    /// Per-connector-call timeout, independent of the job timeout
    /// (default: 10 s)
    #[serde(default = "default_connector_timeout_ms")]
    pub connector_timeout_ms: u64,

    /// Engine name of the primary record store (default: "primary")
    #[serde(default = "default_primary_engine")]
    pub primary_engine: String,

    /// Engine name of the derived search index (default: "search")
    #[serde(default = "default_search_engine")]
    pub search_engine: String,

    /// Engine name of the derived vector index (default: "vector")
    #[serde(default = "default_vector_engine")]
    pub vector_engine: String,
}

fn default_max_concurrent_jobs() -> usize { 5 }
fn default_queue_capacity() -> usize { 1000 }
fn default_dequeue_timeout_ms() -> u64 { 500 }
fn default_heartbeat_interval_ms() -> u64 { 30_000 }
fn default_cleanup_interval_ms() -> u64 { 300_000 } // 5 min
fn default_job_retention_ms() -> u64 { 3_600_000 } // 1 hour
fn default_max_job_history() -> usize { 1000 }
fn default_batch_size() -> usize { 100 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 1000 }
fn default_job_timeout_ms() -> u64 { 300_000 } // 5 min
fn default_connector_timeout_ms() -> u64 { 10_000 }
fn default_primary_engine() -> String { "primary".to_string() }
fn default_search_engine() -> String { "search".to_string() }
fn default_vector_engine() -> String { "vector".to_string() }

impl Default for SyncServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            queue_capacity: default_queue_capacity(),
            dequeue_timeout_ms: default_dequeue_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            job_retention_ms: default_job_retention_ms(),
            max_job_history: default_max_job_history(),
            default_batch_size: default_batch_size(),
            default_max_retries: default_max_retries(),
            default_retry_delay_ms: default_retry_delay_ms(),
            default_job_timeout_ms: default_job_timeout_ms(),
            connector_timeout_ms: default_connector_timeout_ms(),
            primary_engine: default_primary_engine(),
            search_engine: default_search_engine(),
            vector_engine: default_vector_engine(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncServiceConfig::default();
        assert_eq!(config.max_concurrent_jobs, 5);
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.default_batch_size, 100);
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.max_job_history, 1000);
        assert_eq!(config.primary_engine, "primary");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SyncServiceConfig =
            serde_json::from_str(r#"{"max_concurrent_jobs": 2, "search_engine": "es"}"#).unwrap();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.search_engine, "es");
        // Everything else defaulted
        assert_eq!(config.default_retry_delay_ms, 1000);
    }

    #[test]
    fn test_deserialize_empty() {
        let config: SyncServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.heartbeat_interval_ms, 30_000);
        assert_eq!(config.job_retention_ms, 3_600_000);
    }
}
