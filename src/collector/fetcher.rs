//! Risk stats client
//!
//! Sends the `risk_stats` command to one trading server and folds every
//! outcome, including failures, into a [`FetchResult`].

use crate::config::TargetConfig;
use crate::domain::FetchResult;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Command understood by the trading servers' risk endpoint
pub const RISK_STATS_CMD: &str = "risk_stats";

/// Fetches risk stats from one target.
///
/// Implementations never fail: every problem is reported through
/// [`FetchResult::failure`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RiskStatsFetcher: Send + Sync {
    async fn fetch(&self, target: &TargetConfig, timeout: Duration) -> FetchResult;
}

/// Body of the outbound request
#[derive(Debug, Serialize, PartialEq)]
pub struct RiskStatsRequest<'a> {
    pub cmd: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_trading_balance: Option<f64>,
}

impl<'a> RiskStatsRequest<'a> {
    pub fn for_target(target: &'a TargetConfig) -> Self {
        Self {
            cmd: RISK_STATS_CMD,
            date: target.trading_start_date(),
            start_trading_balance: target.start_trading_balance,
        }
    }
}

/// HTTP implementation posting JSON to each target's url
#[derive(Clone)]
pub struct HttpRiskFetcher {
    http: Client,
}

impl HttpRiskFetcher {
    pub fn new() -> Result<Self> {
        let http = Client::builder().build()?;

        Ok(Self { http })
    }

    async fn post(&self, target: &TargetConfig) -> std::result::Result<Value, String> {
        let resp = self
            .http
            .post(&target.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&RiskStatsRequest::for_target(target))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("Request failed with status code {}", status.as_u16()));
        }

        let body = resp.bytes().await.map_err(|e| e.to_string())?;
        // Non-JSON bodies are kept verbatim; they simply never count as active
        Ok(serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned())))
    }
}

#[async_trait]
impl RiskStatsFetcher for HttpRiskFetcher {
    async fn fetch(&self, target: &TargetConfig, timeout: Duration) -> FetchResult {
        match tokio::time::timeout(timeout, self.post(target)).await {
            Ok(Ok(body)) => {
                debug!(server = %target.name, "risk stats received");
                FetchResult::success(target, body)
            }
            Ok(Err(e)) => {
                debug!(server = %target.name, error = %e, "risk stats request failed");
                FetchResult::failure(target, e)
            }
            Err(_) => {
                let message = format!("timeout of {}ms exceeded", timeout.as_millis());
                debug!(server = %target.name, "{}", message);
                FetchResult::failure(target, message)
            }
        }
    }
}
