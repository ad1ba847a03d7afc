//! Error taxonomy for the sync service.
//!
//! [`SyncError::Configuration`] and [`SyncError::QueueFull`] are the only
//! errors a caller sees synchronously, at job submission. Every failure after
//! a successful submission is reported through job state
//! ([`get_job_status`](crate::SyncService::get_job_status)) and the job's
//! error callback, never as a returned error.

use thiserror::Error;

use crate::connector::ConnectorError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid job configuration, rejected at submission time.
    #[error("invalid job configuration: {0}")]
    Configuration(String),

    /// A required connector is down. Retryable.
    #[error("connector '{0}' is unavailable")]
    ConnectorUnavailable(String),

    /// Some records in a batch failed. Counted, non-fatal to the job.
    #[error("{failed} of {total} records in batch failed")]
    PartialBatch { failed: usize, total: usize },

    /// The job exceeded its allotted time. Retryable until exhaustion.
    #[error("job '{0}' exceeded its timeout")]
    Timeout(String),

    /// Manual conflict strategy hit a conflict; the job is parked until an
    /// external call resumes it.
    #[error("job '{0}' requires manual conflict resolution")]
    ConflictUnresolved(String),

    /// No job with this id is tracked.
    #[error("unknown job '{0}'")]
    UnknownJob(String),

    /// The bounded job queue is full; nothing was enqueued.
    #[error("sync queue is full")]
    QueueFull,

    /// Error surfaced by a connector call.
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

impl SyncError {
    /// Whether a job failing with this error should re-enter the retry path.
    ///
    /// `ConflictUnresolved` parks the job instead of retrying; configuration
    /// errors never reach a worker.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Configuration(_) | Self::ConflictUnresolved(_) | Self::UnknownJob(_) | Self::QueueFull
        )
    }
}
