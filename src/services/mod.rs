pub mod aggregator;
pub mod metrics;
pub mod poller;
pub mod snapshot_store;

pub use aggregator::{aggregate, aggregate_at};
pub use metrics::PollMetrics;
pub use poller::{CycleOutcome, PollScheduler};
pub use snapshot_store::SnapshotStore;
