//! # offline-sync
//!
//! CLI tool for inspecting and draining an offline-sync queue.
//!
//! ## Commands
//!
//! - `enqueue`: Queue a request for later replay
//! - `list`: Show queued actions
//! - `drain`: Replay the queue against the backend now
//! - `status`: Show queue status
//!
//! ## Example
//!
//! ```bash
//! # Queue a payment while the backend is unreachable
//! offline-sync enqueue --type record_payment /payments/record \
//!     --field customer_id=7 --field amount=20
//!
//! # See what is waiting
//! offline-sync list
//!
//! # Replay it once the backend is back
//! offline-sync drain
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{drain, enqueue, list, status};

/// CLI tool for inspecting and draining an offline-sync queue.
#[derive(Parser, Debug)]
#[command(name = "offline-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the queue database and client.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: <data-dir>/client.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Queue a request for later replay
    Enqueue {
        /// Target URL (absolute, or relative to the backend base URL)
        url: String,

        /// Symbolic action type, e.g. record_payment
        #[arg(long = "type", short = 't')]
        action_type: String,

        /// HTTP method
        #[arg(long, short, default_value = "POST")]
        method: String,

        /// Form field as name=value (repeatable)
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,

        /// Extra header as "Name: value" (repeatable)
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,

        /// Encode fields as a JSON object instead of a URL-encoded form
        #[arg(long)]
        json: bool,
    },

    /// Show queued actions in replay order
    List {
        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Replay every queued action against the backend
    Drain,

    /// Show queue status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;

    let config = config::load(&data_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Enqueue {
            url,
            action_type,
            method,
            fields,
            headers,
            json,
        } => {
            let request = enqueue::Request {
                url,
                action_type,
                method,
                fields,
                headers,
                json,
            };
            enqueue::run(&config, request).await?;
        }
        Commands::List { json } => {
            list::run(&config, json).await?;
        }
        Commands::Drain => {
            drain::run(&config).await?;
        }
        Commands::Status => {
            status::run(&config).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for offline-sync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ydun", "offline-sync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
