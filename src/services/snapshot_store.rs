//! Holder of the latest published [`Snapshot`].
//!
//! Readers get an `Arc` to a complete snapshot and never hold the lock while
//! using it; the writer swaps the pointer in one step.

use crate::domain::{ServerEntry, Snapshot};
use crate::error::{Result, RiskAggError};
use std::sync::Arc;
use tokio::sync::RwLock;

struct Published {
    /// Poll cycle that produced the snapshot, 0 for the initial empty one
    cycle: u64,
    snapshot: Arc<Snapshot>,
}

/// Shared store, injected into both the poller and the read API
pub struct SnapshotStore {
    current: RwLock<Published>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Published {
                cycle: 0,
                snapshot: Arc::new(Snapshot::empty()),
            }),
        }
    }

    /// Current snapshot; the initial empty one until a cycle completes
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().await.snapshot)
    }

    /// Entry for one server of the current snapshot
    pub async fn server(&self, name: &str) -> Result<ServerEntry> {
        self.snapshot()
            .await
            .servers
            .get(name)
            .cloned()
            .ok_or_else(|| RiskAggError::ServerNotFound(name.to_string()))
    }

    /// Publish the result of `cycle` unless a newer cycle was already published.
    ///
    /// Returns whether the snapshot was installed.
    pub async fn publish(&self, cycle: u64, snapshot: Snapshot) -> bool {
        let mut current = self.current.write().await;
        if cycle <= current.cycle {
            return false;
        }
        *current = Published {
            cycle,
            snapshot: Arc::new(snapshot),
        };
        true
    }

    /// Cycle number of the published snapshot
    pub async fn published_cycle(&self) -> u64 {
        self.current.read().await.cycle
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
