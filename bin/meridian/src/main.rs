//! Meridian - balance-event indexer.
//!
//! # Usage
//!
//! ```bash
//! # Replay a capture directory into the ledger
//! meridian --data-dir ./capture
//!
//! # Start with environment overrides, following the directory
//! DATABASE_URL=postgres://localhost/meridian DATA_DIR=/var/lib/meridian meridian --follow
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};
use tracing_subscriber::{EnvFilter, fmt};

use meridian_core::error::IndexerError;
use meridian_core::metrics::init_metrics;
use meridian_core::services::{BalanceIndexer, IndexerConfig};
use meridian_source::{ReplayBlockSource, ReplaySourceConfig};
use meridian_storage::{Database, DatabaseConfig, PgRepositories};

/// Meridian CLI - balance-event indexer.
#[derive(Parser, Debug)]
#[command(name = "meridian")]
#[command(about = "Meridian - balance-event indexer for the block explorer")]
#[command(version)]
struct Cli {
    /// Directory of captured block messages (<height>.json).
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// PostgreSQL database URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/meridian"
    )]
    database_url: String,

    /// Keep watching the data directory for new blocks.
    #[arg(long, env = "FOLLOW")]
    follow: bool,

    /// Poll interval in seconds while following.
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "2")]
    poll_interval_secs: u64,

    /// Cursor stream identifier (one cursor per capture stream).
    #[arg(long, env = "STREAM_ID", default_value = "replay")]
    stream_id: String,

    /// Prometheus metrics port.
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Run database migrations and exit.
    #[arg(long)]
    migrate_only: bool,

    /// Purge all ledger data from the database and exit.
    ///
    /// This deletes all balance events and resets the ingestion cursor.
    /// Schema/migrations are preserved.
    #[arg(long)]
    purge: bool,

    /// Skip confirmation prompt for destructive operations (like --purge).
    #[arg(long, short = 'y')]
    yes: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // Prometheus metrics exporter (optional - failures don't crash the app)
    let metrics_enabled = match format!("0.0.0.0:{}", cli.metrics_port).parse::<std::net::SocketAddr>()
    {
        Ok(metrics_addr) => {
            match PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
            {
                Ok(()) => {
                    init_metrics();
                    true
                }
                Err(e) => {
                    warn!(
                        "⚠️  Failed to start metrics exporter: {}. Continuing without metrics.",
                        e
                    );
                    false
                }
            }
        }
        Err(e) => {
            warn!("⚠️  Invalid metrics address: {}. Continuing without metrics.", e);
            false
        }
    };

    // ─────────────────────────────────────────────────────────────────────────
    // 🚀 STARTUP
    // ─────────────────────────────────────────────────────────────────────────
    info!("🚀 Starting Meridian Indexer");
    debug!(data_dir = %cli.data_dir.display(), "Block-data directory");
    debug!(database_url = %mask_password(&cli.database_url), "Database endpoint");

    // ─────────────────────────────────────────────────────────────────────────
    // 🗄️ DATABASE
    // ─────────────────────────────────────────────────────────────────────────
    let db_config = DatabaseConfig::for_indexer(&cli.database_url);

    info!("🗄️  Connecting to database...");
    let db = Database::connect(&db_config)
        .await
        .context("Failed to connect to database")?;

    db.migrate().await.context("Failed to run migrations")?;
    info!("🗄️  Database ready (migrations applied)");

    if cli.migrate_only {
        info!("🛑 --migrate-only flag set, exiting");
        return Ok(());
    }

    if cli.purge {
        return handle_purge(&db, cli.yes).await;
    }

    let db = Arc::new(db);
    let repositories = Arc::new(PgRepositories::new(db.clone()));

    // ─────────────────────────────────────────────────────────────────────────
    // 📡 BLOCK-DATA SOURCE
    // ─────────────────────────────────────────────────────────────────────────
    let source_config = ReplaySourceConfig {
        data_dir: cli.data_dir.clone(),
        follow: cli.follow,
        poll_interval: Duration::from_secs(cli.poll_interval_secs),
    };
    let source = Arc::new(ReplayBlockSource::new(source_config));

    let indexer_config = IndexerConfig {
        stream_id: cli.stream_id.clone(),
        ..Default::default()
    };
    let indexer = BalanceIndexer::new(indexer_config, source, repositories);

    // ─────────────────────────────────────────────────────────────────────────
    // ⚡ SERVICES START
    // ─────────────────────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut indexer_handle = tokio::spawn(
        async move {
            match indexer.run(shutdown_rx).await {
                Ok(()) => info!("✅ Stream fully ingested"),
                Err(IndexerError::ShutdownRequested) => {}
                Err(e) => error!(error = ?e, "❌ Indexer error"),
            }
        }
        .instrument(info_span!("indexer")),
    );

    // ─────────────────────────────────────────────────────────────────────────
    // ✅ READY
    // ─────────────────────────────────────────────────────────────────────────
    info!("✅ Meridian ready");
    if metrics_enabled {
        info!(
            "   📊 Metrics:  http://localhost:{}/metrics",
            cli.metrics_port
        );
    } else {
        info!("   📊 Metrics:  disabled");
    }
    info!("   Press Ctrl+C to stop");

    // ─────────────────────────────────────────────────────────────────────────
    // 🛑 SHUTDOWN
    // ─────────────────────────────────────────────────────────────────────────
    tokio::select! {
        _ = shutdown_signal() => {
            info!("🛑 Shutting down...");
            let _ = shutdown_tx.send(true);

            match tokio::time::timeout(Duration::from_secs(30), &mut indexer_handle).await {
                Ok(_) => debug!("Indexer stopped"),
                Err(_) => warn!("⚠️  Indexer shutdown timed out"),
            }
        }
        _ = &mut indexer_handle => {
            debug!("Indexer finished");
        }
    }

    db.close().await;

    info!("🛑 Shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Mask password in database URL for logging.
fn mask_password(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Handle the --purge command.
async fn handle_purge(db: &Database, skip_confirmation: bool) -> Result<()> {
    warn!("⚠️  PURGE MODE: This will delete ALL ledger data!");
    warn!("   - All balance events");
    warn!("   - The ingestion cursor will be reset");
    warn!("   - Schema and migrations will be preserved");

    if !skip_confirmation {
        print!("\n🔴 Are you sure you want to purge all data? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            info!("❌ Purge cancelled");
            return Ok(());
        }
    }

    info!("🗑️  Purging database...");

    let stats = db.purge().await.context("Failed to purge database")?;

    info!("✅ Database purged successfully");
    info!("   📣 Events removed: {}", stats.events_removed);
    info!("   The indexer will re-ingest from the start of the stream");

    Ok(())
}
