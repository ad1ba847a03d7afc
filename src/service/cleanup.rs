// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retention cleanup of terminal job results.

use tracing::debug;

use super::{ServiceCore, SyncService};
use crate::record::now_millis;

impl ServiceCore {
    /// One retention pass.
    ///
    /// Removes results that are terminal and ended before the retention
    /// window, then enforces `max_job_history` by evicting the
    /// oldest-ended terminal results beyond the cap, even if still inside
    /// the window. Non-terminal jobs (pending, running, retrying, parked)
    /// are never touched.
    pub(crate) fn run_cleanup_once(&self) {
        let cutoff = now_millis() - self.config.job_retention_ms as i64;
        let mut evicted = 0usize;

        let expired: Vec<String> = self
            .jobs
            .iter()
            .filter(|r| r.status.is_terminal() && r.ended_at.is_some_and(|t| t < cutoff))
            .map(|r| r.job_id.clone())
            .collect();
        for job_id in expired {
            self.jobs.remove(&job_id);
            self.parked.remove(&job_id);
            evicted += 1;
        }

        let over_cap = self.jobs.len().saturating_sub(self.config.max_job_history);
        if over_cap > 0 {
            let mut terminal: Vec<(String, i64)> = self
                .jobs
                .iter()
                .filter(|r| r.status.is_terminal())
                .map(|r| (r.job_id.clone(), r.ended_at.unwrap_or(0)))
                .collect();
            terminal.sort_by_key(|(_, ended_at)| *ended_at);

            for (job_id, _) in terminal.into_iter().take(over_cap) {
                self.jobs.remove(&job_id);
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(evicted, "cleanup pass evicted job results");
            crate::metrics::record_cleanup_evictions(evicted);
        }
    }
}

impl SyncService {
    /// Run one retention pass immediately, outside the periodic loop.
    pub fn run_cleanup_once(&self) {
        self.core.run_cleanup_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncServiceConfig;
    use crate::job::{JobStatus, SyncJobResult};

    fn service_with(retention_ms: u64, max_history: usize) -> SyncService {
        SyncService::new(SyncServiceConfig {
            job_retention_ms: retention_ms,
            max_job_history: max_history,
            ..Default::default()
        })
    }

    fn seed_job(service: &SyncService, id: &str, status: JobStatus, ended_at: Option<i64>) {
        let mut result = SyncJobResult::pending(id);
        result.status = status;
        result.ended_at = ended_at;
        service.core.jobs.insert(id.to_string(), result);
    }

    #[test]
    fn test_removes_only_old_terminal_jobs() {
        let service = service_with(1000, 100);
        let now = now_millis();

        seed_job(&service, "old-done", JobStatus::Completed, Some(now - 5000));
        seed_job(&service, "fresh-done", JobStatus::Completed, Some(now));
        seed_job(&service, "old-running", JobStatus::Running, None);
        seed_job(&service, "old-parked", JobStatus::AwaitingResolution, None);

        service.run_cleanup_once();

        assert!(service.get_job_status("old-done").is_none());
        assert!(service.get_job_status("fresh-done").is_some());
        assert!(service.get_job_status("old-running").is_some());
        assert!(service.get_job_status("old-parked").is_some());
    }

    #[test]
    fn test_enforces_max_job_history() {
        let service = service_with(u64::MAX / 2, 3);
        let now = now_millis();

        // 6 terminal jobs, all inside the retention window
        for i in 0..6 {
            seed_job(
                &service,
                &format!("job-{i}"),
                JobStatus::Completed,
                Some(now - 100 + i),
            );
        }

        service.run_cleanup_once();

        assert_eq!(service.core.jobs.len(), 3);
        // Oldest-ended were evicted first
        assert!(service.get_job_status("job-0").is_none());
        assert!(service.get_job_status("job-1").is_none());
        assert!(service.get_job_status("job-2").is_none());
        assert!(service.get_job_status("job-5").is_some());
    }

    #[test]
    fn test_cap_never_evicts_non_terminal() {
        let service = service_with(u64::MAX / 2, 1);
        let now = now_millis();

        seed_job(&service, "running-1", JobStatus::Running, None);
        seed_job(&service, "running-2", JobStatus::Running, None);
        seed_job(&service, "done", JobStatus::Failed, Some(now));

        service.run_cleanup_once();

        // Only the terminal job was eligible; actives survive even over cap
        assert!(service.get_job_status("running-1").is_some());
        assert!(service.get_job_status("running-2").is_some());
        assert!(service.get_job_status("done").is_none());
    }

    #[test]
    fn test_seeding_over_cap_leaves_exactly_cap_entries() {
        let service = service_with(u64::MAX / 2, 4);
        let now = now_millis();

        for i in 0..10 {
            seed_job(
                &service,
                &format!("job-{i}"),
                JobStatus::Cancelled,
                Some(now - 1000 + i),
            );
        }

        service.run_cleanup_once();
        assert_eq!(service.core.jobs.len(), 4);
    }

    #[test]
    fn test_empty_pass_is_noop() {
        let service = service_with(1000, 10);
        service.run_cleanup_once();
        assert_eq!(service.core.jobs.len(), 0);
    }
}
