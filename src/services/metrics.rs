use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Poller counters for observability
#[derive(Debug, Default)]
pub struct PollMetrics {
    /// Poll cycles started
    pub cycles_started: AtomicU64,
    /// Poll cycles whose snapshot was published
    pub cycles_completed: AtomicU64,
    /// Poll cycles that failed as a whole
    pub cycles_failed: AtomicU64,
    /// Ticks skipped because a cycle was still running
    pub ticks_skipped: AtomicU64,
    /// Snapshots discarded because a newer cycle had already published
    pub stale_discarded: AtomicU64,
    /// Per-target fetches that returned ok
    pub fetch_ok: AtomicU64,
    /// Per-target fetches that returned an error
    pub fetch_errors: AtomicU64,
    /// Duration of the last finished cycle
    last_cycle_ms: AtomicU64,
    /// Active servers in the last published snapshot
    last_active_servers: AtomicU64,
}

impl PollMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_cycles_started(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cycles_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ticks_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stale_discarded(&self) {
        self.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record per-target outcomes of one cycle
    pub fn record_fetches(&self, ok: u64, errors: u64) {
        self.fetch_ok.fetch_add(ok, Ordering::Relaxed);
        self.fetch_errors.fetch_add(errors, Ordering::Relaxed);
    }

    /// Record a cycle whose snapshot was published
    pub fn record_completed(&self, elapsed: Duration, active_servers: usize) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_ms
            .store(elapsed.as_millis() as u64, Ordering::Relaxed);
        self.last_active_servers
            .store(active_servers as u64, Ordering::Relaxed);
    }

    pub fn last_cycle_ms(&self) -> u64 {
        self.last_cycle_ms.load(Ordering::Relaxed)
    }

    pub fn last_active_servers(&self) -> u64 {
        self.last_active_servers.load(Ordering::Relaxed)
    }

    /// Export metrics in Prometheus format
    pub fn prometheus(&self, uptime_seconds: i64) -> String {
        format!(
            r#"# HELP risk_agg_uptime_seconds Uptime in seconds
# TYPE risk_agg_uptime_seconds counter
risk_agg_uptime_seconds {}

# HELP risk_agg_poll_cycles_started_total Poll cycles started
# TYPE risk_agg_poll_cycles_started_total counter
risk_agg_poll_cycles_started_total {}

# HELP risk_agg_poll_cycles_completed_total Poll cycles that published a snapshot
# TYPE risk_agg_poll_cycles_completed_total counter
risk_agg_poll_cycles_completed_total {}

# HELP risk_agg_poll_cycles_failed_total Poll cycles that failed as a whole
# TYPE risk_agg_poll_cycles_failed_total counter
risk_agg_poll_cycles_failed_total {}

# HELP risk_agg_poll_ticks_skipped_total Ticks skipped while a cycle was running
# TYPE risk_agg_poll_ticks_skipped_total counter
risk_agg_poll_ticks_skipped_total {}

# HELP risk_agg_stale_snapshots_total Snapshots discarded in favour of a newer cycle
# TYPE risk_agg_stale_snapshots_total counter
risk_agg_stale_snapshots_total {}

# HELP risk_agg_fetch_ok_total Target fetches that succeeded
# TYPE risk_agg_fetch_ok_total counter
risk_agg_fetch_ok_total {}

# HELP risk_agg_fetch_errors_total Target fetches that failed
# TYPE risk_agg_fetch_errors_total counter
risk_agg_fetch_errors_total {}

# HELP risk_agg_last_cycle_duration_ms Duration of the last completed cycle
# TYPE risk_agg_last_cycle_duration_ms gauge
risk_agg_last_cycle_duration_ms {}

# HELP risk_agg_active_servers Active servers in the current snapshot
# TYPE risk_agg_active_servers gauge
risk_agg_active_servers {}
"#,
            uptime_seconds,
            self.cycles_started.load(Ordering::Relaxed),
            self.cycles_completed.load(Ordering::Relaxed),
            self.cycles_failed.load(Ordering::Relaxed),
            self.ticks_skipped.load(Ordering::Relaxed),
            self.stale_discarded.load(Ordering::Relaxed),
            self.fetch_ok.load(Ordering::Relaxed),
            self.fetch_errors.load(Ordering::Relaxed),
            self.last_cycle_ms(),
            self.last_active_servers(),
        )
    }
}
