use crate::config::TargetConfig;
use crate::domain::stats::{RiskStats, PROFIT_HISTORY_DAYS};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of the outer request to a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Ok,
    Error,
}

/// Result of polling one target once
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResult {
    pub server: String,
    pub url: String,
    pub status: FetchStatus,
    /// Raw upstream body, set when `status` is ok
    pub data: Option<Value>,
    /// Failure description, set when `status` is error
    pub error: Option<String>,
    /// Stats decoded from `data` when the upstream itself reported success
    #[serde(skip)]
    pub stats: Option<RiskStats>,
}

impl FetchResult {
    pub fn success(target: &TargetConfig, body: Value) -> Self {
        let stats = RiskStats::from_payload(&body);
        Self {
            server: target.name.clone(),
            url: target.url.clone(),
            status: FetchStatus::Ok,
            data: Some(body),
            error: None,
            stats,
        }
    }

    pub fn failure(target: &TargetConfig, error: impl Into<String>) -> Self {
        Self {
            server: target.name.clone(),
            url: target.url.clone(),
            status: FetchStatus::Error,
            data: None,
            error: Some(error.into()),
            stats: None,
        }
    }

    /// Both the request and the upstream report succeeded with usable stats
    pub fn is_active(&self) -> bool {
        self.status == FetchStatus::Ok && self.stats.is_some()
    }
}

/// Registry fields copied next to a result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerConfigInfo {
    pub date_start_trading: Option<String>,
    pub start_trading_balance: Option<f64>,
}

impl From<Option<&TargetConfig>> for ServerConfigInfo {
    fn from(target: Option<&TargetConfig>) -> Self {
        match target {
            Some(target) => Self {
                date_start_trading: target.trading_start_date().map(str::to_string),
                start_trading_balance: target.start_trading_balance,
            },
            None => Self::default(),
        }
    }
}

/// Per-server entry of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEntry {
    #[serde(flatten)]
    pub result: FetchResult,
    pub config: ServerConfigInfo,
}

/// Running totals over all active servers.
///
/// Amounts are summed as exact decimals and written out as JSON numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_servers: usize,
    pub active_servers: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_start_day_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_current_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_day_profit: Decimal,
    pub total_deals_count: u64,
    pub servers_with_limit_reached: usize,
    pub servers_with_auto_close_on_limit: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_max_daily_loss: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_positions_profit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_max_day_balance: Decimal,
    #[serde(serialize_with = "serialize_daily_totals")]
    pub total_profits_last_7_days: [Decimal; PROFIT_HISTORY_DAYS],
    #[serde(with = "rust_decimal::serde::float")]
    pub total_start_trading_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_current_equity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_date_profit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_date_commission: Decimal,
}

/// Aggregated state as of the most recently published poll cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    pub servers: BTreeMap<String, ServerEntry>,
    pub summary: Summary,
}

impl Snapshot {
    /// Snapshot served before the first cycle completes
    pub fn empty() -> Self {
        Self::default()
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_timestamp<S>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match ts {
        Some(ts) => s.serialize_str(&iso_timestamp(ts)),
        None => s.serialize_none(),
    }
}

fn serialize_daily_totals<S>(days: &[Decimal; PROFIT_HISTORY_DAYS], s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut seq = s.serialize_seq(Some(days.len()))?;
    for day in days {
        seq.serialize_element(&day.to_f64().unwrap_or_default())?;
    }
    seq.end()
}
