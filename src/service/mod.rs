// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync service orchestrator.
//!
//! The [`SyncService`] ties together all components:
//! - connector registry with heartbeat health monitoring
//! - bounded job queue consumed by a fixed worker pool
//! - per-stream serialization locks
//! - checksum-based change detection
//! - job lifecycle tracking with retry/backoff
//! - periodic retention cleanup of terminal job results
//!
//! The service is an explicit, caller-owned object: construct it, register
//! connectors, call [`start()`](SyncService::start), and eventually
//! [`shutdown()`](SyncService::shutdown). There is no process-wide state.
//!
//! # Example
//!
//! ```rust,no_run
//! use index_sync::{SyncService, SyncServiceConfig, SyncJobConfig, SyncOperation};
//! use index_sync::connector::memory::MemoryConnector;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let service = SyncService::new(SyncServiceConfig::default());
//! service.register_connector("primary", Arc::new(MemoryConnector::new("primary")));
//! service.register_connector("search", Arc::new(MemoryConnector::new("search")));
//! service.start();
//!
//! let config = SyncJobConfig::new("primary", "search", SyncOperation::Update, "document");
//! let job_id = service.submit_sync_job(config).expect("valid config");
//!
//! // ... poll get_job_status(&job_id) ...
//! service.shutdown().await;
//! # }
//! ```

mod api;
mod cleanup;
mod lifecycle;
mod types;
mod worker;

pub use types::SyncStatistics;

use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::checksum::ChecksumIndex;
use crate::config::SyncServiceConfig;
use crate::job::{StreamKey, SyncJobConfig, SyncJobResult};
use crate::registry::ConnectorRegistry;

/// Shared state behind the service handle. Workers and the periodic loops
/// each hold an `Arc` to this.
pub(crate) struct ServiceCore {
    pub(crate) config: SyncServiceConfig,
    pub(crate) registry: ConnectorRegistry,
    pub(crate) checksums: ChecksumIndex,

    /// One result per job id, mutated in place across retries.
    pub(crate) jobs: DashMap<String, SyncJobResult>,
    /// Configs parked by the Manual conflict strategy, keyed by job id.
    pub(crate) parked: DashMap<String, SyncJobConfig>,
    /// Cooperative cancellation flags, set by `cancel_job`.
    pub(crate) cancel_flags: DashMap<String, Arc<std::sync::atomic::AtomicBool>>,

    pub(crate) queue_tx: mpsc::Sender<SyncJobConfig>,
    /// Single shared receiver; workers take turns dequeuing.
    pub(crate) queue_rx: Mutex<mpsc::Receiver<SyncJobConfig>>,
    pub(crate) queue_depth: AtomicUsize,
    pub(crate) active_jobs: AtomicUsize,

    /// Fair mutex per stream; jobs sharing a key serialize on it.
    pub(crate) stream_locks: DashMap<StreamKey, Arc<Mutex<()>>>,

    pub(crate) shutdown_rx: watch::Receiver<bool>,

    /// Weak self-reference so detached backoff tasks can reach the core.
    pub(crate) self_ref: Weak<ServiceCore>,
}

impl ServiceCore {
    pub(crate) fn stream_lock(&self, key: &StreamKey) -> Arc<Mutex<()>> {
        self.stream_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(crate) fn update_result<F: FnOnce(&mut SyncJobResult)>(&self, job_id: &str, f: F) {
        if let Some(mut result) = self.jobs.get_mut(job_id) {
            f(&mut result);
        }
    }

    pub(crate) fn result_snapshot(&self, job_id: &str) -> Option<SyncJobResult> {
        self.jobs.get(job_id).map(|r| r.clone())
    }
}

/// The data synchronization engine.
///
/// Keeps a primary record store and derived search/vector indexes consistent
/// by running checksum-filtered sync jobs through a fixed pool of workers.
/// See the [module docs](self) for the lifecycle.
pub struct SyncService {
    pub(crate) core: Arc<ServiceCore>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
    pub(crate) tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl SyncService {
    /// Create a stopped service. Register connectors, then call
    /// [`start()`](Self::start).
    #[must_use]
    pub fn new(config: SyncServiceConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let core = Arc::new_cyclic(|self_ref| ServiceCore {
            config,
            registry: ConnectorRegistry::new(),
            checksums: ChecksumIndex::new(),
            jobs: DashMap::new(),
            parked: DashMap::new(),
            cancel_flags: DashMap::new(),
            queue_tx,
            queue_rx: Mutex::new(queue_rx),
            queue_depth: AtomicUsize::new(0),
            active_jobs: AtomicUsize::new(0),
            stream_locks: DashMap::new(),
            shutdown_rx,
            self_ref: self_ref.clone(),
        });

        Self {
            core,
            shutdown_tx,
            tasks: SyncMutex::new(Vec::new()),
        }
    }

    /// Register a connector under an engine name.
    pub fn register_connector(
        &self,
        engine: impl Into<String>,
        connector: Arc<dyn crate::connector::Connector>,
    ) {
        self.core.registry.register(engine, connector);
    }

    /// The connector registry (status queries, explicit reconnects).
    #[must_use]
    pub fn registry(&self) -> &ConnectorRegistry {
        &self.core.registry
    }

    /// The service configuration.
    #[must_use]
    pub fn config(&self) -> &SyncServiceConfig {
        &self.core.config
    }
}
