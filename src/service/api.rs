// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public service operations: submission, status, cancellation, statistics,
//! and the convenience wrappers that build common job configs.

use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::SyncService;
use crate::error::SyncError;
use crate::job::{ConflictStrategy, JobStatus, SyncJobConfig, SyncJobResult, SyncOperation};
use crate::service::types::SyncStatistics;

impl SyncService {
    /// Submit a sync job for asynchronous execution.
    ///
    /// Validates the config and enqueues it, returning the job id
    /// immediately. This is the only synchronous error surface: an invalid
    /// batch size, an unknown engine, or an unavailable connector is
    /// rejected here with nothing enqueued. Every failure after this point
    /// is reported through [`get_job_status`](Self::get_job_status) and the
    /// job's callbacks.
    pub fn submit_sync_job(&self, mut config: SyncJobConfig) -> Result<String, SyncError> {
        let _timer = crate::metrics::LatencyTimer::new("submit");
        if config.batch_size == 0 || config.batch_size > 1000 {
            return Err(SyncError::Configuration(format!(
                "batch_size must be in [1, 1000], got {}",
                config.batch_size
            )));
        }
        for engine in [&config.source_engine, &config.target_engine] {
            if !self.core.registry.is_registered(engine) {
                return Err(SyncError::Configuration(format!(
                    "engine '{engine}' has no registered connector"
                )));
            }
            if !self.core.registry.is_usable(engine) {
                return Err(SyncError::Configuration(format!(
                    "connector for engine '{engine}' is unavailable"
                )));
            }
        }

        let job_id = config
            .job_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        config.job_id = Some(job_id.clone());

        if let Some(existing) = self.core.jobs.get(&job_id) {
            if !existing.status.is_terminal() {
                return Err(SyncError::Configuration(format!(
                    "job '{job_id}' is already active"
                )));
            }
        }

        self.core
            .jobs
            .insert(job_id.clone(), SyncJobResult::pending(&job_id));
        self.core
            .cancel_flags
            .insert(job_id.clone(), Arc::new(AtomicBool::new(false)));

        if let Err(e) = self.core.queue_tx.try_send(config) {
            // Nothing enqueued: roll the bookkeeping back
            self.core.jobs.remove(&job_id);
            self.core.cancel_flags.remove(&job_id);
            warn!(job_id = %job_id, error = %e, "job queue full, rejecting submission");
            return Err(SyncError::QueueFull);
        }

        let depth = self
            .core
            .queue_depth
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1);
        crate::metrics::set_queue_depth(depth);

        info!(job_id = %job_id, "sync job submitted");
        Ok(job_id)
    }

    /// Current result for a job, if tracked.
    #[must_use]
    pub fn get_job_status(&self, job_id: &str) -> Option<SyncJobResult> {
        self.core.result_snapshot(job_id)
    }

    /// Request cooperative cancellation.
    ///
    /// Returns `true` if the job exists and is not yet terminal. The flag is
    /// honored before execution starts and at each batch boundary; an
    /// in-flight batch always completes and is never rolled back. A job
    /// parked in `AwaitingResolution` has no worker to observe the flag, so
    /// it is cancelled on the spot and its parked config dropped.
    pub fn cancel_job(&self, job_id: &str) -> bool {
        let Some(status) = self.core.jobs.get(job_id).map(|r| r.status) else {
            return false;
        };
        if status.is_terminal() {
            return false;
        }

        if status == JobStatus::AwaitingResolution {
            self.core.parked.remove(job_id);
            self.core.finish(job_id, JobStatus::Cancelled);
            debug!(job_id = %job_id, "parked job cancelled");
            return true;
        }

        if let Some(flag) = self.core.cancel_flags.get(job_id) {
            flag.store(true, Ordering::SeqCst);
            debug!(job_id = %job_id, "cancellation requested");
            true
        } else {
            false
        }
    }

    /// Point-in-time statistics snapshot.
    ///
    /// In-memory and process-scoped: none of this survives a restart.
    #[must_use]
    pub fn get_sync_statistics(&self) -> SyncStatistics {
        let mut status_counts: HashMap<JobStatus, usize> = HashMap::new();
        for entry in self.core.jobs.iter() {
            *status_counts.entry(entry.status).or_default() += 1;
        }

        SyncStatistics {
            active_jobs: self.core.active_jobs.load(Ordering::SeqCst),
            queued_jobs: self.core.queue_depth.load(Ordering::SeqCst),
            total_jobs: self.core.jobs.len(),
            status_counts,
            connectors: self.core.registry.statuses(),
            tracked_checksums: self.core.checksums.total_tracked(),
        }
    }

    /// Resume a job parked by the `Manual` conflict strategy.
    ///
    /// Re-submits the parked config with the given automatic strategy.
    pub fn resume_manual_job(
        &self,
        job_id: &str,
        strategy: ConflictStrategy,
    ) -> Result<String, SyncError> {
        if strategy == ConflictStrategy::Manual {
            return Err(SyncError::Configuration(
                "resume requires an automatic conflict strategy".to_string(),
            ));
        }
        let (_, mut config) = self
            .core
            .parked
            .remove(job_id)
            .ok_or_else(|| SyncError::UnknownJob(job_id.to_string()))?;
        config.conflict_resolution = strategy;

        self.core.update_result(job_id, |r| r.status = JobStatus::Pending);
        if let Some(flag) = self.core.cancel_flags.get(job_id) {
            flag.store(false, Ordering::SeqCst);
        }

        if let Err(e) = self.core.queue_tx.try_send(config) {
            warn!(job_id = %job_id, error = %e, "queue full while resuming parked job");
            return Err(SyncError::QueueFull);
        }
        let depth = self
            .core
            .queue_depth
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1);
        crate::metrics::set_queue_depth(depth);

        info!(job_id = %job_id, strategy = ?strategy, "parked job resumed");
        Ok(job_id.to_string())
    }

    fn default_job(
        &self,
        source: &str,
        target: &str,
        operation: SyncOperation,
        data_type: &str,
    ) -> SyncJobConfig {
        let cfg = &self.core.config;
        SyncJobConfig::new(source, target, operation, data_type)
            .with_batch_size(cfg.default_batch_size)
            .with_max_retries(cfg.default_max_retries)
            .with_retry_delay(Duration::from_millis(cfg.default_retry_delay_ms))
            .with_timeout(Duration::from_millis(cfg.default_job_timeout_ms))
    }

    /// Sync records of one scope from the primary store to the search index.
    ///
    /// `sub_scope_id` narrows the sync to a single sub-scope; `force_full`
    /// bypasses change detection and re-pushes every record.
    pub fn sync_records(
        &self,
        scope_id: &str,
        sub_scope_id: Option<&str>,
        force_full: bool,
    ) -> Result<String, SyncError> {
        let cfg = &self.core.config;
        let mut job = self
            .default_job(
                &cfg.primary_engine,
                &cfg.search_engine,
                SyncOperation::BulkUpdate,
                "record",
            )
            .with_filter("scope_id", json!(scope_id))
            .with_force_full(force_full);
        if let Some(sub) = sub_scope_id {
            job = job.with_filter("sub_scope_id", json!(sub));
        }
        self.submit_sync_job(job)
    }

    /// Sync derived values (embeddings and the like) from the primary store
    /// to the vector index, optionally limited to specific record ids.
    pub fn sync_derived_values(
        &self,
        scope_id: &str,
        ids: Option<Vec<String>>,
    ) -> Result<String, SyncError> {
        let cfg = &self.core.config;
        let mut job = self
            .default_job(
                &cfg.primary_engine,
                &cfg.vector_engine,
                SyncOperation::BulkUpdate,
                "derived_value",
            )
            .with_filter("scope_id", json!(scope_id));
        if let Some(ids) = ids {
            job = job.with_filter("record_ids", json!(ids));
        }
        self.submit_sync_job(job)
    }

    /// Incrementally sync one data type from the primary store to the
    /// search index, limited to records updated after `since_timestamp`
    /// (epoch millis) when given.
    pub fn incremental_sync(
        &self,
        data_type: &str,
        since_timestamp: Option<i64>,
    ) -> Result<String, SyncError> {
        let cfg = &self.core.config;
        let mut job = self.default_job(
            &cfg.primary_engine,
            &cfg.search_engine,
            SyncOperation::BulkUpdate,
            data_type,
        );
        if let Some(since) = since_timestamp {
            job = job.with_filter("updated_since", json!(since));
        }
        self.submit_sync_job(job)
    }
}
