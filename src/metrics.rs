// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for index-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process is responsible for choosing the exporter
//! (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `index_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `status`: job terminal status
//! - `outcome`: success, failed, skipped
//! - `engine`: connector engine name

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a job reaching a terminal (or parked) status
pub fn record_job(status: &str) {
    counter!(
        "index_sync_jobs_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record per-record outcomes for a finished attempt
pub fn record_records(outcome: &str, count: usize) {
    counter!(
        "index_sync_records_total",
        "outcome" => outcome.to_string()
    )
    .increment(count as u64);
}

/// Record a retry being scheduled
pub fn record_retry(reason: &str) {
    counter!(
        "index_sync_retries_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record end-to-end job duration
pub fn record_job_duration(duration: Duration) {
    histogram!("index_sync_job_seconds").record(duration.as_secs_f64());
}

/// Record one written batch's size
pub fn record_batch_size(count: usize) {
    histogram!("index_sync_batch_size").record(count as f64);
}

/// Set current queue depth (submitted, not yet dequeued)
pub fn set_queue_depth(depth: usize) {
    gauge!("index_sync_queue_depth").set(depth as f64);
}

/// Set number of currently executing jobs
pub fn set_active_jobs(count: usize) {
    gauge!("index_sync_active_jobs").set(count as f64);
}

/// Set connector health (1 = usable, 0 = not)
pub fn set_connector_usable(engine: &str, usable: bool) {
    gauge!(
        "index_sync_connector_usable",
        "engine" => engine.to_string()
    )
    .set(if usable { 1.0 } else { 0.0 });
}

/// Record a heartbeat pass over the registry
pub fn record_heartbeat(engine: &str, outcome: &str) {
    counter!(
        "index_sync_heartbeats_total",
        "engine" => engine.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record job results evicted by the retention pass
pub fn record_cleanup_evictions(count: usize) {
    counter!("index_sync_cleanup_evictions_total").increment(count as u64);
}

/// Record checksum index size
pub fn set_tracked_checksums(count: usize) {
    gauge!("index_sync_tracked_checksums").set(count as f64);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(
            "index_sync_operation_seconds",
            "operation" => self.operation
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests verify the API compiles and doesn't panic.
    // In production, you'd use metrics-util's Recorder for assertions.

    #[test]
    fn test_counters() {
        record_job("completed");
        record_job("failed");
        record_records("success", 10);
        record_records("skipped", 3);
        record_retry("timeout");
        record_heartbeat("search", "available");
        record_cleanup_evictions(5);
    }

    #[test]
    fn test_gauges() {
        set_queue_depth(7);
        set_active_jobs(2);
        set_connector_usable("search", true);
        set_connector_usable("vector", false);
        set_tracked_checksums(1234);
    }

    #[test]
    fn test_histograms() {
        record_job_duration(Duration::from_millis(250));
        record_batch_size(100);
    }

    #[test]
    fn test_latency_timer() {
        {
            let _timer = LatencyTimer::new("submit");
            std::thread::sleep(Duration::from_micros(10));
        }
        // Timer recorded on drop
    }
}
