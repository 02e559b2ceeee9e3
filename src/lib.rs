pub mod api;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod services;

pub use collector::{HttpRiskFetcher, RiskStatsFetcher};
pub use config::{AppConfig, OverlapPolicy, TargetConfig};
pub use domain::{FetchResult, FetchStatus, RiskStats, ServerEntry, Snapshot, Summary};
pub use error::{Result, RiskAggError};
pub use services::{aggregate, CycleOutcome, PollMetrics, PollScheduler, SnapshotStore};
