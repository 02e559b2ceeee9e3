use anyhow::Context;
use clap::Parser;
use risk_aggregator::api::{self, AppState};
use risk_aggregator::collector::HttpRiskFetcher;
use risk_aggregator::config::AppConfig;
use risk_aggregator::logging::init_logging;
use risk_aggregator::services::{PollMetrics, PollScheduler, SnapshotStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Aggregates risk stats from trading servers and serves the latest snapshot
#[derive(Debug, Parser)]
#[command(name = "risk-aggregator", version, about)]
struct Cli {
    /// Configuration file (JSON, TOML or YAML)
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override the HTTP port from the configuration
    #[arg(short, long)]
    port: Option<u16>,
}

/// Why the process is shutting down
enum ShutdownCause {
    Signal(&'static str),
    Fault(String),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_validated(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    init_logging(&config.logging);
    info!("Loading config from: {}", config_path.display());

    let store = Arc::new(SnapshotStore::new());
    let metrics = Arc::new(PollMetrics::new());
    let fetcher = Arc::new(HttpRiskFetcher::new()?);
    let scheduler = Arc::new(PollScheduler::from_config(
        &config,
        fetcher,
        Arc::clone(&store),
        Arc::clone(&metrics),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Risk aggregation server started on port {}", config.port);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server: JoinHandle<risk_aggregator::Result<()>> = tokio::spawn(api::serve(
        listener,
        AppState::new(store, metrics),
        shutdown_rx.clone(),
    ));
    let mut poller: JoinHandle<()> = tokio::spawn(scheduler.run(shutdown_rx));

    let (cause, server_done, poller_done) = tokio::select! {
        name = shutdown_signal() => (ShutdownCause::Signal(name), false, false),
        res = &mut server => {
            let reason = match res {
                Ok(Ok(())) => "HTTP server stopped unexpectedly".to_string(),
                Ok(Err(e)) => format!("HTTP server error: {}", e),
                Err(e) => format!("HTTP server task failed: {}", e),
            };
            (ShutdownCause::Fault(reason), true, false)
        }
        res = &mut poller => {
            let reason = match res {
                Ok(()) => "poller stopped unexpectedly".to_string(),
                Err(e) => format!("poller task failed: {}", e),
            };
            (ShutdownCause::Fault(reason), false, true)
        }
    };

    match &cause {
        ShutdownCause::Signal(name) => info!("Received {}, starting graceful shutdown...", name),
        ShutdownCause::Fault(reason) => error!("{}, starting graceful shutdown...", reason),
    }

    let _ = shutdown_tx.send(true);

    if !poller_done {
        if let Err(e) = poller.await {
            warn!("Poller task ended abnormally: {}", e);
        }
    }

    let drained = server_done || drain_server(server, config.shutdown_timeout()).await;

    match cause {
        ShutdownCause::Signal(_) if drained => {
            info!("Shutdown complete");
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

/// Wait for in-flight responses to finish, bounded by `timeout`
async fn drain_server(
    server: JoinHandle<risk_aggregator::Result<()>>,
    timeout: std::time::Duration,
) -> bool {
    match tokio::time::timeout(timeout, server).await {
        Ok(Ok(Ok(()))) => {
            info!("HTTP server closed");
            true
        }
        Ok(Ok(Err(e))) => {
            error!("HTTP server error during shutdown: {}", e);
            false
        }
        Ok(Err(e)) => {
            error!("HTTP server task failed during shutdown: {}", e);
            false
        }
        Err(_) => {
            error!("Forced shutdown after timeout");
            false
        }
    }
}

async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
