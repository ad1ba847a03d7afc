//! Job model: configuration, status, and results.
//!
//! A [`SyncJobConfig`] describes one synchronization pass between a source
//! and a target engine. Configs are immutable after submission; a retry
//! re-enqueues a clone while the retry counter lives on the single
//! [`SyncJobResult`] tracked per job id.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fired after each written batch: `(job_id, processed_items, total_items)`.
pub type ProgressCallback = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;
/// Fired once when the job reaches `Completed`.
pub type CompleteCallback = Arc<dyn Fn(&SyncJobResult) + Send + Sync>;
/// Fired once when the job reaches `Failed`, with the final error message.
pub type ErrorCallback = Arc<dyn Fn(&SyncJobResult, &str) + Send + Sync>;

/// The mutation a sync job applies to the target engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
    BulkCreate,
    BulkUpdate,
    BulkDelete,
}

impl SyncOperation {
    /// Delete-type operations go through `delete_batch` and skip change
    /// detection entirely.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete | Self::BulkDelete)
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::BulkCreate => "bulk_create",
            Self::BulkUpdate => "bulk_update",
            Self::BulkDelete => "bulk_delete",
        };
        write!(f, "{s}")
    }
}

/// Policy for reconciling divergent source/target state.
///
/// The first four strategies execute automatically. `Manual` parks the job
/// in [`JobStatus::AwaitingResolution`] whenever a conflicting target record
/// exists; [`resume_manual_job`](crate::SyncService::resume_manual_job)
/// re-submits it with an automatic strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Always push the source value.
    SourceWins,
    /// Skip records where the target is independently newer.
    TargetWins,
    /// Compare timestamps, push only if the source is strictly newer.
    LatestWins,
    /// Field-level merge of target and source content before writing.
    Merge,
    /// Do not write; park the job for external resolution.
    Manual,
}

/// Job lifecycle status.
///
/// ```text
/// pending → running → {completed, failed, cancelled}
/// (failed attempt) → retrying → pending     bounded by max_retries
/// running → cancelled                        only at a batch boundary
/// running → awaiting_resolution              Manual strategy hit a conflict
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Retrying,
    Completed,
    Failed,
    Cancelled,
    /// Parked by the `Manual` conflict strategy; never auto-retried.
    AwaitingResolution,
}

impl JobStatus {
    /// Terminal states admit no further transitions and are eligible for
    /// retention cleanup. `AwaitingResolution` is deliberately not terminal:
    /// it waits for an external resume call.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::AwaitingResolution => "awaiting_resolution",
        };
        write!(f, "{s}")
    }
}

/// Configuration for one sync job.
///
/// # Example
///
/// ```
/// use index_sync::{SyncJobConfig, SyncOperation, ConflictStrategy};
///
/// let config = SyncJobConfig::new("primary", "search", SyncOperation::Update, "document")
///     .with_batch_size(50)
///     .with_max_retries(2)
///     .with_conflict_resolution(ConflictStrategy::LatestWins);
///
/// assert_eq!(config.batch_size, 50);
/// ```
#[derive(Clone)]
pub struct SyncJobConfig {
    /// Assigned at submission when absent.
    pub job_id: Option<String>,
    pub source_engine: String,
    pub target_engine: String,
    pub operation: SyncOperation,
    pub data_type: String,
    /// Records per target write. Validated to [1, 1000] at submission.
    pub batch_size: usize,
    pub max_retries: u32,
    /// Base retry delay; attempt n sleeps `retry_delay * 2^n`.
    pub retry_delay: Duration,
    /// Per-job execution timeout. Exceeding it is a retryable failure.
    pub timeout: Duration,
    pub conflict_resolution: ConflictStrategy,
    /// Opaque filter map passed to the connectors' `fetch`.
    pub filters: HashMap<String, Value>,
    /// Bypass change detection and push every fetched record.
    pub force_full: bool,
    pub on_progress: Option<ProgressCallback>,
    pub on_complete: Option<CompleteCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl SyncJobConfig {
    /// Create a config with library defaults for the tuning knobs.
    pub fn new(
        source_engine: impl Into<String>,
        target_engine: impl Into<String>,
        operation: SyncOperation,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            job_id: None,
            source_engine: source_engine.into(),
            target_engine: target_engine.into(),
            operation,
            data_type: data_type.into(),
            batch_size: 100,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
            conflict_resolution: ConflictStrategy::SourceWins,
            filters: HashMap::new(),
            force_full: false,
            on_progress: None,
            on_complete: None,
            on_error: None,
        }
    }

    #[must_use]
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_conflict_resolution(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_resolution = strategy;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_force_full(mut self, force_full: bool) -> Self {
        self.force_full = force_full;
        self
    }

    #[must_use]
    pub fn with_on_progress(mut self, cb: ProgressCallback) -> Self {
        self.on_progress = Some(cb);
        self
    }

    #[must_use]
    pub fn with_on_complete(mut self, cb: CompleteCallback) -> Self {
        self.on_complete = Some(cb);
        self
    }

    #[must_use]
    pub fn with_on_error(mut self, cb: ErrorCallback) -> Self {
        self.on_error = Some(cb);
        self
    }

    /// The serialization unit this job belongs to.
    #[must_use]
    pub fn stream_key(&self) -> StreamKey {
        StreamKey {
            source_engine: self.source_engine.clone(),
            target_engine: self.target_engine.clone(),
            data_type: self.data_type.clone(),
        }
    }
}

// Callbacks are opaque, elide them
impl fmt::Debug for SyncJobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncJobConfig")
            .field("job_id", &self.job_id)
            .field("source_engine", &self.source_engine)
            .field("target_engine", &self.target_engine)
            .field("operation", &self.operation)
            .field("data_type", &self.data_type)
            .field("batch_size", &self.batch_size)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("timeout", &self.timeout)
            .field("conflict_resolution", &self.conflict_resolution)
            .field("filters", &self.filters)
            .field("force_full", &self.force_full)
            .finish_non_exhaustive()
    }
}

/// The unit of serialization: jobs sharing a key never run concurrently,
/// jobs on distinct keys run fully in parallel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub source_engine: String,
    pub target_engine: String,
    pub data_type: String,
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}:{}",
            self.source_engine, self.target_engine, self.data_type
        )
    }
}

/// The mutable outcome of a job, updated in place across retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobResult {
    pub job_id: String,
    pub status: JobStatus,
    /// Records fetched from the source.
    pub total_items: usize,
    /// Records attempted against the target (success + failed).
    pub processed_items: usize,
    pub success_items: usize,
    pub failed_items: usize,
    /// Records whose checksum matched the target's index entry.
    pub skipped_items: usize,
    pub retry_count: u32,
    /// Epoch millis of the first `Running` transition.
    pub started_at: Option<i64>,
    /// Epoch millis of the terminal transition.
    pub ended_at: Option<i64>,
    pub errors: Vec<String>,
}

impl SyncJobResult {
    #[must_use]
    pub fn pending(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            total_items: 0,
            processed_items: 0,
            success_items: 0,
            failed_items: 0,
            skipped_items: 0,
            retry_count: 0,
            started_at: None,
            ended_at: None,
            errors: Vec::new(),
        }
    }

    /// Reset per-attempt counters. Retry count and errors accumulate
    /// across attempts.
    pub fn reset_counters(&mut self) {
        self.total_items = 0;
        self.processed_items = 0;
        self.success_items = 0;
        self.failed_items = 0;
        self.skipped_items = 0;
    }

    /// Processed items per second over the job's wall time, if finished.
    #[must_use]
    pub fn throughput(&self) -> Option<f64> {
        let (start, end) = (self.started_at?, self.ended_at?);
        let elapsed_ms = (end - start).max(1) as f64;
        Some(self.processed_items as f64 * 1000.0 / elapsed_ms)
    }
}
