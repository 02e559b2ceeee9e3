//! Tracing subscriber setup

use crate::config::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Directory for the optional daily-rotated log file
pub const LOG_DIR_ENV: &str = "RISK_AGG_LOG_DIR";

/// Default filter when `RUST_LOG` is unset: the configured level with the
/// HTTP stack held at warn
pub fn default_filter(level: &str) -> String {
    format!("{},hyper=warn,reqwest=warn,tower_http=warn", level.trim())
}

pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.level)));

    let file_layer = std::env::var(LOG_DIR_ENV).ok().and_then(|log_dir| {
        // `tracing_appender::rolling::daily` panics if the first file cannot
        // be created, so check writability up front
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                log_dir, e
            );
            return None;
        }
        let test_path = std::path::Path::new(&log_dir).join(".risk_agg_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let file_appender = tracing_appender::rolling::daily(&log_dir, "risk-aggregator.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive for the lifetime of the process
                Box::leak(Box::new(guard));

                eprintln!("Logging to: {}/risk-aggregator.log", log_dir);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    });

    let json_layer = config
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let console_layer = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        let directives = default_filter(" debug ");
        assert_eq!(directives, "debug,hyper=warn,reqwest=warn,tower_http=warn");
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
