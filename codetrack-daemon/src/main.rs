//! codetrack daemon - system metrics and coding-session broadcast server
//!
//! Serves WebSocket subscribers (metrics monitor, external dashboards,
//! filtered subscriptions) and a tracking endpoint editor plugins report
//! coding sessions to. Rolling 7-day totals are kept per reporting client.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use codetrack_broadcaster::{BroadcastHub, DurationLedger, SessionTracker};
use codetrack_daemon::poller::spawn_metrics_poller;
use codetrack_daemon::version::VersionInfo;
use codetrack_daemon::{build_router, AppState, DaemonConfig};

#[derive(Parser, Debug)]
#[command(name = "codetrack-daemon", version, about)]
struct Args {
    /// Path to config file (created with defaults if missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen address (overrides config)
    #[arg(long)]
    bind: Option<String>,

    /// Print build information and exit
    #[arg(long)]
    build_info: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.build_info {
        print!("codetrack-daemon {}", VersionInfo::current());
        return Ok(());
    }

    // Load configuration
    let mut config = match &args.config {
        Some(path) => DaemonConfig::load_from(path),
        None => DaemonConfig::load(),
    }
    .context("Failed to load configuration")?;
    config.apply_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("codetrack=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    info!("Starting codetrack daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config.config_path.display());

    let hub = BroadcastHub::spawn(config.hub_config());
    let ledger = Arc::new(DurationLedger::new().with_window(config.ledger_window()));
    let tracker = SessionTracker::new(hub.clone(), ledger);

    let poller = spawn_metrics_poller(hub.clone(), config.metrics_interval());

    let listen_addr = config.listen_addr();
    let port = config.port;
    let state = Arc::new(AppState::new(config, tracker));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;

    info!("Server listening on {}", listen_addr);
    info!("WebSocket endpoints:");
    info!("  Monitor (metrics):     ws://localhost:{}/ws/monitor", port);
    info!("  External (sessions):   ws://localhost:{}/ws/external", port);
    info!("  Filtered:              ws://localhost:{}/ws/subscribe?types=", port);
    info!("  Tracking (ingest):     ws://localhost:{}/ws/track", port);
    info!("HTTP endpoints:");
    info!("  Health:                http://localhost:{}/health", port);
    info!("  Stats:                 http://localhost:{}/stats", port);

    let served = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = &served {
        error!("Server error: {}", e);
    }

    // Close subscriber connections before leaving
    poller.abort();
    if let Err(e) = hub.shutdown().await {
        error!("Hub shutdown: {}", e);
    }

    info!("Daemon stopped");
    served.context("Server terminated with an error")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down daemon"),
        Err(e) => {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
