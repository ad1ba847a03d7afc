// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Service lifecycle: starting the worker pool and periodic loops,
//! graceful shutdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use super::{ServiceCore, SyncService};

impl SyncService {
    /// Start the worker pool, heartbeat loop, and cleanup loop.
    ///
    /// Idempotent-ish: calling twice spawns a second set of loops, so don't.
    /// The heartbeat runs immediately on start, so connector statuses are
    /// populated before the first interval elapses.
    pub fn start(&self) {
        let core = self.core.clone();
        let workers = core.config.max_concurrent_jobs.max(1);
        info!(
            workers,
            heartbeat_ms = core.config.heartbeat_interval_ms,
            cleanup_ms = core.config.cleanup_interval_ms,
            "starting sync service"
        );

        let mut tasks = self.tasks.lock();
        for worker_id in 0..workers {
            let core = self.core.clone();
            let shutdown = self.shutdown_tx.subscribe();
            tasks.push(tokio::spawn(core.worker_loop(worker_id, shutdown)));
        }

        tasks.push(tokio::spawn(heartbeat_loop(
            self.core.clone(),
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(cleanup_loop(
            self.core.clone(),
            self.shutdown_tx.subscribe(),
        )));
    }

    /// Signal shutdown and wait for every spawned task to stop.
    ///
    /// Workers observe the signal at their next dequeue timeout; a running
    /// job finishes its current attempt first.
    pub async fn shutdown(&self) {
        info!("sync service shutting down");
        let _ = self.shutdown_tx.send(true);

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        debug!("sync service stopped");
    }
}

async fn heartbeat_loop(core: Arc<ServiceCore>, mut shutdown: watch::Receiver<bool>) {
    let interval = Duration::from_millis(core.config.heartbeat_interval_ms.max(1));
    let ping_timeout = Duration::from_millis(core.config.connector_timeout_ms.max(1));
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                core.registry.heartbeat(ping_timeout).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("heartbeat loop stopped");
}

async fn cleanup_loop(core: Arc<ServiceCore>, mut shutdown: watch::Receiver<bool>) {
    let interval = Duration::from_millis(core.config.cleanup_interval_ms.max(1));
    let mut ticker = tokio::time::interval(interval);
    // Skip the immediate first tick; there is nothing to clean at start
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                core.run_cleanup_once();
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("cleanup loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncServiceConfig;
    use crate::connector::memory::MemoryConnector;
    use crate::registry::ConnectorHealth;

    #[tokio::test]
    async fn test_start_populates_connector_status() {
        let config = SyncServiceConfig {
            heartbeat_interval_ms: 20,
            ..Default::default()
        };
        let service = SyncService::new(config);
        service.register_connector("primary", Arc::new(MemoryConnector::new("primary")));
        service.start();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = service.registry().status("primary").unwrap();
        assert_eq!(status.health, ConnectorHealth::Available);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_tasks() {
        let config = SyncServiceConfig {
            dequeue_timeout_ms: 10,
            heartbeat_interval_ms: 10,
            cleanup_interval_ms: 10,
            ..Default::default()
        };
        let service = SyncService::new(config);
        service.start();
        service.shutdown().await;

        assert!(service.tasks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_tracks_outage_and_recovery() {
        let config = SyncServiceConfig {
            heartbeat_interval_ms: 15,
            ..Default::default()
        };
        let service = SyncService::new(config);
        let connector = Arc::new(MemoryConnector::new("search"));
        service.register_connector("search", connector.clone());
        service.start();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(
            service.registry().status("search").unwrap().health,
            ConnectorHealth::Available
        );

        connector.set_fail_pings(true);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(
            service.registry().status("search").unwrap().health,
            ConnectorHealth::Unavailable
        );

        connector.set_fail_pings(false);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(
            service.registry().status("search").unwrap().health,
            ConnectorHealth::Available
        );

        service.shutdown().await;
    }
}
