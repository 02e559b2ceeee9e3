//! Poll cycle scheduler
//!
//! Polls every configured target once immediately and then on a fixed period.
//! Each cycle fans out one task per target, waits for all of them, reduces the
//! batch and publishes the resulting snapshot. Failures of single targets end
//! up in that target's entry; a cycle that fails as a whole leaves the
//! published snapshot untouched.

use crate::collector::RiskStatsFetcher;
use crate::config::{AppConfig, OverlapPolicy, TargetConfig};
use crate::domain::{FetchResult, FetchStatus, Snapshot};
use crate::services::aggregator::aggregate;
use crate::services::{PollMetrics, SnapshotStore};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// How a single poll cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Snapshot installed in the store
    Published {
        cycle: u64,
        total_servers: usize,
        active_servers: usize,
    },
    /// A newer cycle had already published; this result was dropped
    Superseded { cycle: u64 },
    /// The cycle failed as a whole; the previous snapshot is kept
    Failed { cycle: u64, reason: String },
}

/// Periodic poller owning the write side of the snapshot store
pub struct PollScheduler {
    targets: Arc<Vec<TargetConfig>>,
    fetcher: Arc<dyn RiskStatsFetcher>,
    store: Arc<SnapshotStore>,
    metrics: Arc<PollMetrics>,
    interval: Duration,
    request_timeout: Duration,
    overlap: OverlapPolicy,
    next_cycle: AtomicU64,
}

impl PollScheduler {
    pub fn new(
        targets: Vec<TargetConfig>,
        fetcher: Arc<dyn RiskStatsFetcher>,
        store: Arc<SnapshotStore>,
        metrics: Arc<PollMetrics>,
    ) -> Self {
        Self {
            targets: Arc::new(targets),
            fetcher,
            store,
            metrics,
            interval: Duration::from_millis(1000),
            request_timeout: Duration::from_millis(5000),
            overlap: OverlapPolicy::Skip,
            next_cycle: AtomicU64::new(1),
        }
    }

    /// Build a scheduler from the loaded configuration
    pub fn from_config(
        config: &AppConfig,
        fetcher: Arc<dyn RiskStatsFetcher>,
        store: Arc<SnapshotStore>,
        metrics: Arc<PollMetrics>,
    ) -> Self {
        Self::new(config.servers.clone(), fetcher, store, metrics)
            .with_interval(config.poll_interval())
            .with_request_timeout(config.request_timeout())
            .with_overlap(config.overlap)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    ///
    /// The first cycle starts immediately. Cycles still running at shutdown
    /// are abandoned.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Started polling {} servers every {}ms (overlap: {})",
            self.targets.len(),
            self.interval.as_millis(),
            self.overlap
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles: JoinSet<CycleOutcome> = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                    self.reap(joined);
                }
                _ = ticker.tick() => {
                    if self.skip_tick(&mut cycles) {
                        continue;
                    }
                    let this = Arc::clone(&self);
                    cycles.spawn(async move { this.poll_once().await });
                }
            }
        }

        cycles.abort_all();
        info!("Stopped polling servers");
    }

    /// Collect cycles that already finished, then decide whether a tick has to
    /// be skipped because a cycle is still running.
    fn skip_tick(&self, cycles: &mut JoinSet<CycleOutcome>) -> bool {
        while let Some(joined) = cycles.try_join_next() {
            self.reap(joined);
        }

        if self.overlap == OverlapPolicy::Skip && !cycles.is_empty() {
            self.metrics.inc_ticks_skipped();
            warn!("Previous poll cycle still running, skipping tick");
            return true;
        }
        false
    }

    fn reap(&self, joined: Result<CycleOutcome, JoinError>) {
        if let Err(e) = joined {
            self.metrics.inc_cycles_failed();
            error!("Poll cycle task failed: {}", e);
        }
    }

    /// Run one complete cycle and publish its snapshot
    pub async fn poll_once(&self) -> CycleOutcome {
        let cycle = self.next_cycle.fetch_add(1, Ordering::SeqCst);
        self.metrics.inc_cycles_started();
        let started = Instant::now();
        debug!(cycle, "Poll cycle started");

        let targets = Arc::clone(&self.targets);
        let fetcher = Arc::clone(&self.fetcher);
        let timeout = self.request_timeout;
        let joined = tokio::spawn(async move {
            let results = collect(&targets, &fetcher, timeout).await;
            let snapshot = aggregate(&results, &targets);
            (results, snapshot)
        })
        .await;

        let (results, snapshot) = match joined {
            Ok(done) => done,
            Err(e) => {
                self.metrics.inc_cycles_failed();
                error!(cycle, "Error polling servers: {}", e);
                return CycleOutcome::Failed {
                    cycle,
                    reason: e.to_string(),
                };
            }
        };

        let errors = results
            .iter()
            .filter(|r| r.status == FetchStatus::Error)
            .count();
        self.metrics
            .record_fetches((results.len() - errors) as u64, errors as u64);

        self.publish(cycle, snapshot, started.elapsed()).await
    }

    async fn publish(&self, cycle: u64, snapshot: Snapshot, elapsed: Duration) -> CycleOutcome {
        let total_servers = snapshot.summary.total_servers;
        let active_servers = snapshot.summary.active_servers;

        if !self.store.publish(cycle, snapshot).await {
            self.metrics.inc_stale_discarded();
            debug!(cycle, "Newer cycle already published, dropping result");
            return CycleOutcome::Superseded { cycle };
        }

        self.metrics.record_completed(elapsed, active_servers);
        info!(
            cycle,
            elapsed_ms = elapsed.as_millis() as u64,
            "Polled {} servers, {} active",
            total_servers,
            active_servers
        );
        CycleOutcome::Published {
            cycle,
            total_servers,
            active_servers,
        }
    }
}

/// Fetch every target concurrently and wait for all of them.
///
/// Results come back in registry order. A fetch task that dies is reported
/// as that target's error.
async fn collect(
    targets: &[TargetConfig],
    fetcher: &Arc<dyn RiskStatsFetcher>,
    timeout: Duration,
) -> Vec<FetchResult> {
    let tasks: Vec<_> = targets
        .iter()
        .cloned()
        .map(|target| {
            let fetcher = Arc::clone(fetcher);
            tokio::spawn(async move { fetcher.fetch(&target, timeout).await })
        })
        .collect();

    join_all(tasks)
        .await
        .into_iter()
        .zip(targets)
        .map(|(joined, target)| match joined {
            Ok(result) => result,
            Err(e) => {
                warn!(server = %target.name, "Fetch task failed: {}", e);
                FetchResult::failure(target, format!("fetch task failed: {}", e))
            }
        })
        .collect()
}
