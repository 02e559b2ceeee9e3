use thiserror::Error;

/// Main error type for the risk aggregator
#[derive(Error, Debug)]
pub enum RiskAggError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Query errors
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RiskAggError
pub type Result<T> = std::result::Result<T, RiskAggError>;

impl RiskAggError {
    /// True for lookups of a server name absent from the current snapshot
    pub fn is_not_found(&self) -> bool {
        matches!(self, RiskAggError::ServerNotFound(_))
    }
}
