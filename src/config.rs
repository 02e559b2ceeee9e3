use crate::error::{Result, RiskAggError};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default location of the configuration file when `CONFIG_PATH` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/config1.json";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP port for the read API (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Period between poll cycles in milliseconds
    #[serde(
        default = "default_poll_interval",
        alias = "pollInterval",
        alias = "pollinterval"
    )]
    pub poll_interval_ms: u64,
    /// Per-target request timeout in milliseconds
    #[serde(
        default = "default_request_timeout",
        alias = "requestTimeout",
        alias = "requesttimeout"
    )]
    pub request_timeout_ms: u64,
    /// What to do when a tick fires while the previous cycle is still running
    #[serde(default)]
    pub overlap: OverlapPolicy,
    /// Upper bound for draining in-flight HTTP responses on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// Trading servers to poll
    #[serde(default)]
    pub servers: Vec<TargetConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One remote risk endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Unique server name, used as the key in snapshots
    pub name: String,
    /// Endpoint receiving the `risk_stats` command
    pub url: String,
    /// Trading start date forwarded upstream as `date`
    #[serde(default, alias = "trading_start_date")]
    pub date_start_trading: Option<String>,
    /// Balance at the trading start date
    #[serde(default, alias = "trading_start_balance")]
    pub start_trading_balance: Option<f64>,
}

impl TargetConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            date_start_trading: None,
            start_trading_balance: None,
        }
    }

    pub fn with_trading_start(mut self, date: impl Into<String>, balance: Option<f64>) -> Self {
        self.date_start_trading = Some(date.into());
        self.start_trading_balance = balance;
        self
    }

    /// Trading start date, ignoring empty strings
    pub fn trading_start_date(&self) -> Option<&str> {
        self.date_start_trading
            .as_deref()
            .filter(|date| !date.trim().is_empty())
    }
}

/// Poll cycle overlap handling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Skip ticks while a cycle is in flight
    #[default]
    Skip,
    /// Start a cycle on every tick; only newer cycles may replace the snapshot
    Allow,
}

impl std::fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlapPolicy::Skip => write!(f, "skip"),
            OverlapPolicy::Allow => write!(f, "allow"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Resolve the config file path from `CONFIG_PATH`, falling back to the default
    pub fn default_path() -> PathBuf {
        std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from the default path and environment
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific file, with environment overrides
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let builder = Config::builder()
            // Start with default values
            .set_default("port", i64::from(default_port()))?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .set_default("overlap", "skip")?
            .set_default("shutdown_timeout_secs", default_shutdown_timeout() as i64)?
            // Format is picked from the file extension (json, toml, yaml)
            .add_source(File::from(path.as_ref()).required(true))
            // Override with environment variables (RISK_AGG__PORT, etc.)
            .add_source(
                Environment::with_prefix("RISK_AGG")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load and validate in one step
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::load_from(path)?;
        config.validate().map_err(RiskAggError::InvalidConfig)?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be positive".to_string());
        }

        if self.request_timeout_ms == 0 {
            errors.push("request_timeout_ms must be positive".to_string());
        }

        let mut seen = HashSet::new();
        for (idx, server) in self.servers.iter().enumerate() {
            let name = server.name.trim();
            if name.is_empty() {
                errors.push(format!("servers[{idx}]: name must not be empty"));
            } else if !seen.insert(name) {
                errors.push(format!("servers[{idx}]: duplicate server name '{name}'"));
            }

            match Url::parse(&server.url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => errors.push(format!(
                    "servers[{idx}] ({name}): unsupported url scheme '{}'",
                    url.scheme()
                )),
                Err(e) => errors.push(format!("servers[{idx}] ({name}): invalid url: {e}")),
            }

            if let Some(balance) = server.start_trading_balance {
                if !balance.is_finite() || balance < 0.0 {
                    errors.push(format!(
                        "servers[{idx}] ({name}): start_trading_balance must be a non-negative number"
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
