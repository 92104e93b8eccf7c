//! sync-worker binary entry point.
//!
//! Usage:
//! ```bash
//! sync-worker --config worker.toml
//! sync-worker --help
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use offline_sync_worker::http::{build_router, health};
use offline_sync_worker::{CacheManager, HttpFetcher, SqliteCacheStorage, WorkerConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Caching background worker for offline-sync.
#[derive(Parser, Debug)]
#[command(name = "sync-worker", version, about)]
struct Args {
    /// Configuration file.
    #[arg(long, default_value = "worker.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    health::init_start_time();

    let args = Args::parse();
    let config = load_config(&args.config)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "sync-worker starting"
    );

    let storage = SqliteCacheStorage::new(&config.cache.database)
        .await
        .with_context(|| format!("opening cache at {}", config.cache.database.display()))?;
    let manager = CacheManager::new(&config, Arc::new(HttpFetcher::new()), Arc::new(storage))
        .context("building cache manager")?;
    let manager = Arc::new(manager);

    // A failed install leaves this version redundant; the previously active
    // bucket, if any, keeps serving.
    if let Err(e) = manager.install().await {
        tracing::error!(error = %e, "continuing without interception");
    }

    let listener = tokio::net::TcpListener::bind(&config.http.bind_address)
        .await
        .with_context(|| format!("binding {}", config.http.bind_address))?;
    tracing::info!(address = %config.http.bind_address, state = manager.state().name(), "listening");

    axum::serve(listener, build_router(manager))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("sync-worker stopped");
    Ok(())
}

fn load_config(path: &std::path::Path) -> Result<WorkerConfig> {
    if path.exists() {
        WorkerConfig::from_file(path).context("loading configuration")
    } else {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        Ok(WorkerConfig::default())
    }
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
