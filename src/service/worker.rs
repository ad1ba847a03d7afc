// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Worker pool: job execution, change detection, batching, retry/backoff.
//!
//! A fixed pool of workers shares one queue receiver. Each worker dequeues
//! with a bounded wait so shutdown is observed promptly, then runs the job
//! under the stream lock for its `(source, target, data_type)` key. Jobs on
//! distinct streams run fully in parallel; jobs sharing a stream serialize
//! in submission order (the queue is FIFO and the stream mutex is fair).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::ServiceCore;
use crate::conflict::{resolve, Resolution};
use crate::connector::{Connector, ConnectorError};
use crate::error::SyncError;
use crate::job::{ConflictStrategy, JobStatus, SyncJobConfig};
use crate::record::{now_millis, DataRecord};
use crate::retry::BackoffPolicy;

/// How a job attempt ended when no error was raised.
enum Outcome {
    Completed,
    Cancelled,
}

impl ServiceCore {
    /// Main loop of one worker task.
    pub(crate) async fn worker_loop(
        self: Arc<Self>,
        worker_id: usize,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let dequeue_timeout = Duration::from_millis(self.config.dequeue_timeout_ms.max(1));
        debug!(worker_id, "sync worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            // Bounded wait so the shutdown flag is re-checked regularly
            let job = {
                let mut rx = self.queue_rx.lock().await;
                match tokio::time::timeout(dequeue_timeout, rx.recv()).await {
                    Ok(Some(job)) => job,
                    Ok(None) => break, // queue closed
                    Err(_) => continue,
                }
            };

            let depth = self
                .queue_depth
                .fetch_sub(1, Ordering::SeqCst)
                .saturating_sub(1);
            crate::metrics::set_queue_depth(depth);

            self.process_job(job).await;
        }

        debug!(worker_id, "sync worker stopped");
    }

    /// Run one dequeued job through its full lifecycle.
    async fn process_job(&self, job: SyncJobConfig) {
        // submit_sync_job always fills this in
        let Some(job_id) = job.job_id.clone() else {
            error!("dequeued job without an id, dropping");
            return;
        };
        let cancel_flag = self
            .cancel_flags
            .get(&job_id)
            .map(|f| f.clone())
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

        // Cancelled while still queued: never starts
        if cancel_flag.load(Ordering::SeqCst) {
            self.finish(&job_id, JobStatus::Cancelled);
            info!(job_id = %job_id, "job cancelled before execution");
            return;
        }

        // Fail fast into the retry path when an engine is down
        for engine in [&job.source_engine, &job.target_engine] {
            if !self.registry.is_usable(engine) {
                self.handle_failure(&job, &job_id, SyncError::ConnectorUnavailable(engine.clone()));
                return;
            }
        }

        let stream = job.stream_key();
        let lock = self.stream_lock(&stream);
        let _guard = lock.lock().await;

        let attempt_start = Instant::now();
        self.update_result(&job_id, |r| {
            r.status = JobStatus::Running;
            r.started_at.get_or_insert_with(now_millis);
            r.reset_counters();
        });
        let active = self.active_jobs.fetch_add(1, Ordering::SeqCst) + 1;
        crate::metrics::set_active_jobs(active);
        debug!(job_id = %job_id, stream = %stream, "job running");

        let outcome = match tokio::time::timeout(
            job.timeout,
            self.execute(&job, &job_id, &cancel_flag),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(job_id.clone())),
        };

        let active = self.active_jobs.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        crate::metrics::set_active_jobs(active);
        crate::metrics::record_job_duration(attempt_start.elapsed());

        match outcome {
            Ok(Outcome::Completed) => {
                self.finish(&job_id, JobStatus::Completed);
                let result = self.result_snapshot(&job_id);
                if let Some(result) = &result {
                    info!(
                        job_id = %job_id,
                        total = result.total_items,
                        success = result.success_items,
                        failed = result.failed_items,
                        skipped = result.skipped_items,
                        "job completed"
                    );
                    crate::metrics::record_records("success", result.success_items);
                    crate::metrics::record_records("failed", result.failed_items);
                    crate::metrics::record_records("skipped", result.skipped_items);
                    if let Some(cb) = &job.on_complete {
                        cb(result);
                    }
                }
            }
            Ok(Outcome::Cancelled) => {
                self.finish(&job_id, JobStatus::Cancelled);
                info!(job_id = %job_id, "job cancelled at batch boundary");
            }
            Err(SyncError::ConflictUnresolved(_)) => {
                // Parked, not retried; an external resume call continues it
                self.parked.insert(job_id.clone(), job.clone());
                self.update_result(&job_id, |r| r.status = JobStatus::AwaitingResolution);
                crate::metrics::record_job("awaiting_resolution");
                warn!(job_id = %job_id, "job parked awaiting manual conflict resolution");
            }
            Err(err) => self.handle_failure(&job, &job_id, err),
        }
    }

    /// Retry/backoff controller for a failed attempt.
    fn handle_failure(&self, job: &SyncJobConfig, job_id: &str, err: SyncError) {
        let mut retry_count = 0;
        self.update_result(job_id, |r| {
            r.retry_count += 1;
            r.errors.push(err.to_string());
            retry_count = r.retry_count;
        });

        if retry_count < job.max_retries {
            let delay = BackoffPolicy::new(job.retry_delay).delay_for(retry_count);
            warn!(
                job_id = %job_id,
                attempt = retry_count,
                max = job.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "job attempt failed, scheduling retry"
            );
            self.update_result(job_id, |r| r.status = JobStatus::Retrying);
            crate::metrics::record_retry(match &err {
                SyncError::Timeout(_) => "timeout",
                SyncError::ConnectorUnavailable(_) => "connector_unavailable",
                _ => "error",
            });

            // The backoff task may outlive this worker's borrow; it holds
            // its own strong reference to the core
            if let Some(core) = self.self_ref.upgrade() {
                let job = job.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    core.re_enqueue(job).await;
                });
            } else {
                self.finish(job_id, JobStatus::Failed);
            }
        } else {
            self.finish(job_id, JobStatus::Failed);
            error!(job_id = %job_id, attempts = retry_count, error = %err, "job failed terminally");
            if let Some(cb) = &job.on_error {
                if let Some(result) = self.result_snapshot(job_id) {
                    cb(&result, &err.to_string());
                }
            }
        }
    }

    /// Mark a terminal status and drop the cancellation flag.
    pub(crate) fn finish(&self, job_id: &str, status: JobStatus) {
        self.update_result(job_id, |r| {
            r.status = status;
            r.ended_at = Some(now_millis());
        });
        self.cancel_flags.remove(job_id);
        crate::metrics::record_job(&status.to_string());
    }

    /// One attempt: fetch, change-detect, resolve, write in batches.
    async fn execute(
        &self,
        job: &SyncJobConfig,
        job_id: &str,
        cancel_flag: &AtomicBool,
    ) -> Result<Outcome, SyncError> {
        let source = self
            .registry
            .get(&job.source_engine)
            .ok_or_else(|| SyncError::ConnectorUnavailable(job.source_engine.clone()))?;
        let target = self
            .registry
            .get(&job.target_engine)
            .ok_or_else(|| SyncError::ConnectorUnavailable(job.target_engine.clone()))?;
        let call_timeout = Duration::from_millis(self.config.connector_timeout_ms);

        let records = self
            .connector_call(call_timeout, source.fetch(&job.filters))
            .await?;
        let total = records.len();
        self.update_result(job_id, |r| r.total_items = total);
        debug!(job_id = %job_id, fetched = total, "source records fetched");

        if job.operation.is_delete() {
            return self
                .run_delete_batches(job, job_id, cancel_flag, target.as_ref(), records, call_timeout)
                .await;
        }

        // Change detection: skip records whose hash matches the target index
        let mut changed = Vec::with_capacity(records.len());
        let mut skipped = 0usize;
        for record in records {
            if job.force_full || self.checksums.is_changed(&job.target_engine, &record) {
                changed.push(record);
            } else {
                skipped += 1;
            }
        }
        self.update_result(job_id, |r| r.skipped_items = skipped);

        // Conflict resolution against the target's current state. SourceWins
        // never consults the target, so skip the extra fetch.
        let to_write = if job.conflict_resolution == ConflictStrategy::SourceWins {
            changed
        } else {
            let target_state: HashMap<String, DataRecord> = self
                .connector_call(call_timeout, target.fetch(&job.filters))
                .await?
                .into_iter()
                .map(|r| (r.record_id.clone(), r))
                .collect();

            let mut resolved = Vec::with_capacity(changed.len());
            for record in changed {
                match resolve(
                    job.conflict_resolution,
                    &record,
                    target_state.get(&record.record_id),
                ) {
                    // Resolution may rewrite the content (Merge), so the
                    // output is checked against the index again: a merge
                    // whose result was already synced is a no-op
                    Resolution::Write(rec) => {
                        if !job.force_full && !self.checksums.is_changed(&job.target_engine, &rec)
                        {
                            self.update_result(job_id, |r| r.skipped_items += 1);
                        } else {
                            resolved.push(rec);
                        }
                    }
                    Resolution::Skip => {
                        self.update_result(job_id, |r| r.skipped_items += 1);
                    }
                    Resolution::NeedsManual => {
                        return Err(SyncError::ConflictUnresolved(job_id.to_string()));
                    }
                }
            }
            resolved
        };

        self.run_write_batches(job, job_id, cancel_flag, target.as_ref(), to_write, call_timeout)
            .await
    }

    async fn run_write_batches(
        &self,
        job: &SyncJobConfig,
        job_id: &str,
        cancel_flag: &AtomicBool,
        target: &dyn Connector,
        to_write: Vec<DataRecord>,
        call_timeout: Duration,
    ) -> Result<Outcome, SyncError> {
        for chunk in to_write.chunks(job.batch_size) {
            // Cancellation is observed only between batches
            if cancel_flag.load(Ordering::SeqCst) {
                return Ok(Outcome::Cancelled);
            }

            match self
                .connector_call(call_timeout, target.write_batch(chunk, job.operation))
                .await
            {
                Ok(accepted) => {
                    let failed = chunk.len() - accepted.min(chunk.len());
                    self.update_result(job_id, |r| {
                        r.processed_items += chunk.len();
                        r.success_items += accepted.min(chunk.len());
                        r.failed_items += failed;
                    });
                    if failed == 0 {
                        // Write-then-record: advance hashes only once the
                        // whole batch was accepted
                        for record in chunk {
                            self.checksums.record_synced(
                                &job.target_engine,
                                &record.record_id,
                                &record.checksum,
                            );
                        }
                    } else {
                        let err = SyncError::PartialBatch {
                            failed,
                            total: chunk.len(),
                        };
                        warn!(job_id = %job_id, %err, "partial batch acceptance");
                        self.update_result(job_id, |r| r.errors.push(err.to_string()));
                    }
                    crate::metrics::record_batch_size(chunk.len());
                }
                // Engine gone or call timed out: job-level, enters retry path
                Err(err @ (SyncError::ConnectorUnavailable(_) | SyncError::Timeout(_))) => {
                    return Err(err);
                }
                // Backend rejected this batch: count it, keep going with the rest
                Err(err) => {
                    warn!(job_id = %job_id, error = %err, "batch write failed");
                    self.update_result(job_id, |r| {
                        r.processed_items += chunk.len();
                        r.failed_items += chunk.len();
                        r.errors.push(err.to_string());
                    });
                }
            }

            if let Some(cb) = &job.on_progress {
                if let Some(result) = self.result_snapshot(job_id) {
                    cb(job_id, result.processed_items, result.total_items);
                }
            }
        }
        crate::metrics::set_tracked_checksums(self.checksums.total_tracked());
        Ok(Outcome::Completed)
    }

    async fn run_delete_batches(
        &self,
        job: &SyncJobConfig,
        job_id: &str,
        cancel_flag: &AtomicBool,
        target: &dyn Connector,
        records: Vec<DataRecord>,
        call_timeout: Duration,
    ) -> Result<Outcome, SyncError> {
        let ids: Vec<String> = records.into_iter().map(|r| r.record_id).collect();

        for chunk in ids.chunks(job.batch_size) {
            if cancel_flag.load(Ordering::SeqCst) {
                return Ok(Outcome::Cancelled);
            }

            match self
                .connector_call(call_timeout, target.delete_batch(chunk))
                .await
            {
                Ok(accepted) => {
                    let failed = chunk.len() - accepted.min(chunk.len());
                    self.update_result(job_id, |r| {
                        r.processed_items += chunk.len();
                        r.success_items += accepted.min(chunk.len());
                        r.failed_items += failed;
                    });
                    if failed == 0 {
                        for id in chunk {
                            self.checksums.forget(&job.target_engine, id);
                        }
                    } else {
                        let err = SyncError::PartialBatch {
                            failed,
                            total: chunk.len(),
                        };
                        self.update_result(job_id, |r| r.errors.push(err.to_string()));
                    }
                }
                Err(err @ (SyncError::ConnectorUnavailable(_) | SyncError::Timeout(_))) => {
                    return Err(err);
                }
                Err(err) => {
                    warn!(job_id = %job_id, error = %err, "batch delete failed");
                    self.update_result(job_id, |r| {
                        r.processed_items += chunk.len();
                        r.failed_items += chunk.len();
                        r.errors.push(err.to_string());
                    });
                }
            }

            if let Some(cb) = &job.on_progress {
                if let Some(result) = self.result_snapshot(job_id) {
                    cb(job_id, result.processed_items, result.total_items);
                }
            }
        }
        Ok(Outcome::Completed)
    }

    /// Wrap a connector call with the per-call timeout and error mapping.
    async fn connector_call<T>(
        &self,
        call_timeout: Duration,
        fut: impl std::future::Future<Output = Result<T, ConnectorError>>,
    ) -> Result<T, SyncError> {
        match tokio::time::timeout(call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(ConnectorError::Unavailable(e))) => Err(SyncError::ConnectorUnavailable(e)),
            Ok(Err(e)) => Err(SyncError::Connector(e)),
            Err(_) => Err(SyncError::Timeout("connector call".to_string())),
        }
    }

    /// Re-enqueue a retried job, or fail it if the service is shutting down.
    async fn re_enqueue(&self, job: SyncJobConfig) {
        let Some(job_id) = job.job_id.clone() else { return };

        if *self.shutdown_rx.borrow() {
            self.finish(&job_id, JobStatus::Failed);
            return;
        }

        self.update_result(&job_id, |r| r.status = JobStatus::Pending);
        if self.queue_tx.send(job).await.is_ok() {
            let depth = self
                .queue_depth
                .fetch_add(1, Ordering::SeqCst)
                .saturating_add(1);
            crate::metrics::set_queue_depth(depth);
        } else {
            // Queue closed under us
            self.finish(&job_id, JobStatus::Failed);
        }
    }

}
