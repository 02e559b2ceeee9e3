use crate::services::{PollMetrics, SnapshotStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Latest aggregated snapshot, written by the poller
    pub store: Arc<SnapshotStore>,

    /// Poller counters
    pub metrics: Arc<PollMetrics>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<SnapshotStore>, metrics: Arc<PollMetrics>) -> Self {
        Self {
            store,
            metrics,
            start_time: Utc::now(),
        }
    }

    /// Get system uptime in seconds
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
