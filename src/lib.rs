//! # Index Sync
//!
//! A data synchronization engine that keeps a primary record store and one
//! or more derived search/vector indexes consistent after mutations.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Sync Queue & Scheduler                 │
//! │  • submit_sync_job() validates and enqueues                │
//! │  • Bounded FIFO queue, fails fast on invalid configs       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Worker Pool                          │
//! │  • Fixed pool of concurrent workers                        │
//! │  • Per-stream serialization (source, target, data_type)    │
//! │  • Retry with exponential backoff, per-job timeout         │
//! │  • Cooperative cancellation at batch boundaries            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │ Checksum Index  │ │Conflict Resolver│ │Connector Registry│
//! │ • SHA-256 over  │ │ • source_wins   │ │ • fetch/write/  │
//! │   canonical JSON│ │ • target_wins   │ │   delete/ping   │
//! │ • skip unchanged│ │ • latest_wins   │ │ • heartbeat     │
//! │   records       │ │ • merge/manual  │ │   health flags  │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use index_sync::{SyncService, SyncServiceConfig, SyncJobConfig, SyncOperation};
//! use index_sync::connector::memory::MemoryConnector;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = SyncService::new(SyncServiceConfig::default());
//!     service.register_connector("primary", Arc::new(MemoryConnector::new("primary")));
//!     service.register_connector("search", Arc::new(MemoryConnector::new("search")));
//!     service.start();
//!
//!     let config = SyncJobConfig::new("primary", "search", SyncOperation::BulkUpdate, "document");
//!     let job_id = service.submit_sync_job(config).expect("valid config");
//!
//!     // Poll for the result; failures after submission surface here,
//!     // never as errors
//!     if let Some(result) = service.get_job_status(&job_id) {
//!         println!("status: {}", result.status);
//!     }
//!
//!     service.shutdown().await;
//! }
//! ```
//!
//! ## Features
//!
//! - **Change Detection**: SHA-256 over canonicalized content makes repeated
//!   syncs of unchanged data idempotent no-ops
//! - **Per-Stream Serialization**: jobs on one `(source, target, data_type)`
//!   stream never overlap; distinct streams run in parallel
//! - **Conflict Resolution**: source-wins, target-wins, latest-wins, merge,
//!   or park for manual resolution
//! - **Health Monitoring**: periodic connector heartbeats; down engines fail
//!   jobs fast into the retry path
//! - **Retry/Backoff**: exponential backoff bounded by `max_retries`
//! - **Retention Cleanup**: terminal job results evicted by age and count
//!
//! All job and connector state is in-memory and process-scoped; nothing
//! survives a restart. The crate is a single logical instance and provides
//! no cross-node coordination.
//!
//! ## Modules
//!
//! - [`service`]: the main [`SyncService`] orchestrating all components
//! - [`connector`]: the storage-engine adapter contract
//! - [`registry`]: connector registry and health monitoring
//! - [`checksum`]: canonical hashing and the checksum index
//! - [`conflict`]: conflict resolution strategies
//! - [`job`]: job configs, statuses, and results
//! - [`retry`]: backoff policy

pub mod checksum;
pub mod config;
pub mod conflict;
pub mod connector;
pub mod error;
pub mod job;
pub mod metrics;
pub mod record;
pub mod registry;
pub mod retry;
pub mod service;

pub use checksum::{content_hash, ChecksumIndex};
pub use config::SyncServiceConfig;
pub use conflict::Resolution;
pub use connector::{Connector, ConnectorError};
pub use error::SyncError;
pub use job::{
    ConflictStrategy, JobStatus, StreamKey, SyncJobConfig, SyncJobResult, SyncOperation,
};
pub use record::DataRecord;
pub use registry::{ConnectorHealth, ConnectorRegistry, ConnectorStatus};
pub use retry::BackoffPolicy;
pub use service::{SyncService, SyncStatistics};
pub use self::metrics::LatencyTimer;
