// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Connector registry and health tracking.
//!
//! The registry maps engine names to [`Connector`] implementations and keeps
//! a [`ConnectorStatus`] per engine, updated by the heartbeat loop or an
//! explicit [`reconnect`](ConnectorRegistry::reconnect) call. Connectors are
//! never deregistered by health checks; only their status flag moves.

use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::connector::Connector;
use crate::record::now_millis;

/// Health flag of one registered connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    /// Last ping succeeded.
    Available,
    /// Last ping errored or timed out.
    Unavailable,
    /// Reachable but self-reporting unhealthy (`ping() == Ok(false)`).
    Degraded,
    /// Never pinged yet.
    Unknown,
}

impl fmt::Display for ConnectorHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Degraded => "degraded",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time status of one connector, owned by the registry.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectorStatus {
    pub engine: String,
    pub health: ConnectorHealth,
    /// Epoch millis of the last ping attempt.
    pub last_ping: Option<i64>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl ConnectorStatus {
    fn unknown(engine: &str) -> Self {
        Self {
            engine: engine.to_string(),
            health: ConnectorHealth::Unknown,
            last_ping: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

/// Registry of engine name to connector, with health tracking.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: DashMap<String, Arc<dyn Connector>>,
    statuses: DashMap<String, ConnectorStatus>,
}

impl ConnectorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connectors: DashMap::new(),
            statuses: DashMap::new(),
        }
    }

    /// Register a connector under an engine name. Replaces any previous
    /// registration and resets its status to `Unknown`.
    pub fn register(&self, engine: impl Into<String>, connector: Arc<dyn Connector>) {
        let engine = engine.into();
        debug!(engine = %engine, "registering connector");
        self.statuses
            .insert(engine.clone(), ConnectorStatus::unknown(&engine));
        self.connectors.insert(engine, connector);
    }

    #[must_use]
    pub fn get(&self, engine: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(engine).map(|c| c.value().clone())
    }

    #[must_use]
    pub fn is_registered(&self, engine: &str) -> bool {
        self.connectors.contains_key(engine)
    }

    /// Whether workers may route calls to this engine.
    ///
    /// `Degraded` still counts as usable; `Unknown` does too, so that jobs
    /// submitted before the first heartbeat are not rejected.
    #[must_use]
    pub fn is_usable(&self, engine: &str) -> bool {
        self.statuses.get(engine).is_some_and(|s| {
            matches!(
                s.health,
                ConnectorHealth::Available | ConnectorHealth::Degraded | ConnectorHealth::Unknown
            )
        })
    }

    #[must_use]
    pub fn status(&self, engine: &str) -> Option<ConnectorStatus> {
        self.statuses.get(engine).map(|s| s.clone())
    }

    /// Snapshot of every connector's status.
    #[must_use]
    pub fn statuses(&self) -> Vec<ConnectorStatus> {
        let mut statuses: Vec<ConnectorStatus> =
            self.statuses.iter().map(|s| s.clone()).collect();
        statuses.sort_by(|a, b| a.engine.cmp(&b.engine));
        statuses
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Ping one connector and fold the outcome into its status.
    pub async fn ping_engine(&self, engine: &str, timeout: Duration) {
        let Some(connector) = self.get(engine) else {
            return;
        };

        let outcome = tokio::time::timeout(timeout, connector.ping()).await;
        let mut entry = match self.statuses.get_mut(engine) {
            Some(entry) => entry,
            None => return,
        };
        entry.last_ping = Some(now_millis());

        match outcome {
            Ok(Ok(true)) => {
                if entry.health != ConnectorHealth::Available {
                    debug!(engine = %engine, "connector back to available");
                }
                entry.health = ConnectorHealth::Available;
                entry.last_error = None;
                entry.consecutive_failures = 0;
                crate::metrics::record_heartbeat(engine, "available");
            }
            Ok(Ok(false)) => {
                warn!(engine = %engine, "connector reports unhealthy");
                entry.health = ConnectorHealth::Degraded;
                entry.last_error = Some("engine reports unhealthy".to_string());
                crate::metrics::record_heartbeat(engine, "degraded");
            }
            Ok(Err(e)) => {
                warn!(engine = %engine, error = %e, "connector ping failed");
                entry.health = ConnectorHealth::Unavailable;
                entry.last_error = Some(e.to_string());
                entry.consecutive_failures += 1;
                crate::metrics::record_heartbeat(engine, "unavailable");
            }
            Err(_) => {
                warn!(engine = %engine, timeout_ms = timeout.as_millis() as u64, "connector ping timed out");
                entry.health = ConnectorHealth::Unavailable;
                entry.last_error = Some("ping timed out".to_string());
                entry.consecutive_failures += 1;
                crate::metrics::record_heartbeat(engine, "unavailable");
            }
        }

        let usable = matches!(
            entry.health,
            ConnectorHealth::Available | ConnectorHealth::Degraded
        );
        crate::metrics::set_connector_usable(engine, usable);
    }

    /// One heartbeat pass: ping every registered connector.
    pub async fn heartbeat(&self, timeout: Duration) {
        let engines: Vec<String> = self.connectors.iter().map(|c| c.key().clone()).collect();
        for engine in engines {
            self.ping_engine(&engine, timeout).await;
        }
    }

    /// Explicit reconnect attempt: immediately re-ping one engine and
    /// return whether it is usable afterwards.
    pub async fn reconnect(&self, engine: &str, timeout: Duration) -> bool {
        self.ping_engine(engine, timeout).await;
        self.is_usable(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::memory::MemoryConnector;

    const PING_TIMEOUT: Duration = Duration::from_millis(200);

    fn registry_with(engine: &str) -> (ConnectorRegistry, Arc<MemoryConnector>) {
        let registry = ConnectorRegistry::new();
        let connector = Arc::new(MemoryConnector::new(engine));
        registry.register(engine, connector.clone());
        (registry, connector)
    }

    #[test]
    fn test_register_starts_unknown() {
        let (registry, _) = registry_with("search");

        let status = registry.status("search").unwrap();
        assert_eq!(status.health, ConnectorHealth::Unknown);
        assert!(status.last_ping.is_none());
        assert!(registry.is_registered("search"));
        assert!(!registry.is_registered("vector"));
    }

    #[test]
    fn test_unknown_is_usable_before_first_ping() {
        let (registry, _) = registry_with("search");
        assert!(registry.is_usable("search"));
        assert!(!registry.is_usable("unregistered"));
    }

    #[tokio::test]
    async fn test_heartbeat_marks_available() {
        let (registry, _) = registry_with("search");

        registry.heartbeat(PING_TIMEOUT).await;

        let status = registry.status("search").unwrap();
        assert_eq!(status.health, ConnectorHealth::Available);
        assert!(status.last_ping.is_some());
        assert_eq!(status.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_heartbeat_sequence_fail_fail_ok() {
        let (registry, connector) = registry_with("search");

        connector.set_fail_pings(true);
        registry.heartbeat(PING_TIMEOUT).await;
        assert_eq!(registry.status("search").unwrap().health, ConnectorHealth::Unavailable);

        registry.heartbeat(PING_TIMEOUT).await;
        let status = registry.status("search").unwrap();
        assert_eq!(status.health, ConnectorHealth::Unavailable);
        assert_eq!(status.consecutive_failures, 2);

        connector.set_fail_pings(false);
        registry.heartbeat(PING_TIMEOUT).await;
        let status = registry.status("search").unwrap();
        assert_eq!(status.health, ConnectorHealth::Available);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_unhealthy_ping_marks_degraded() {
        let (registry, connector) = registry_with("search");
        connector.set_report_unhealthy(true);

        registry.heartbeat(PING_TIMEOUT).await;

        let status = registry.status("search").unwrap();
        assert_eq!(status.health, ConnectorHealth::Degraded);
        // Degraded connectors still take traffic
        assert!(registry.is_usable("search"));
    }

    #[tokio::test]
    async fn test_unavailable_is_not_usable() {
        let (registry, connector) = registry_with("search");
        connector.set_fail_pings(true);

        registry.heartbeat(PING_TIMEOUT).await;

        assert!(!registry.is_usable("search"));
        // Still registered - health never deregisters
        assert!(registry.is_registered("search"));
    }

    #[tokio::test]
    async fn test_reconnect() {
        let (registry, connector) = registry_with("search");
        connector.set_fail_pings(true);
        registry.heartbeat(PING_TIMEOUT).await;
        assert!(!registry.is_usable("search"));

        connector.set_fail_pings(false);
        assert!(registry.reconnect("search", PING_TIMEOUT).await);
        assert_eq!(registry.status("search").unwrap().health, ConnectorHealth::Available);
    }

    #[tokio::test]
    async fn test_statuses_snapshot_sorted() {
        let registry = ConnectorRegistry::new();
        registry.register("vector", Arc::new(MemoryConnector::new("vector")));
        registry.register("primary", Arc::new(MemoryConnector::new("primary")));
        registry.register("search", Arc::new(MemoryConnector::new("search")));

        let statuses = registry.statuses();
        let engines: Vec<&str> = statuses.iter().map(|s| s.engine.as_str()).collect();
        assert_eq!(engines, ["primary", "search", "vector"]);
    }
}
