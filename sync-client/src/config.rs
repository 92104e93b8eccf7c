//! Configuration loading for the page runtime.
//!
//! Configuration is loaded from a TOML file (default: `client.toml`).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Root configuration for the page runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Durable queue configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Replay configuration.
    #[serde(default)]
    pub replay: ReplayConfig,
    /// Connectivity configuration.
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    /// Background worker connection.
    #[serde(default)]
    pub worker: WorkerChannelConfig,
}

/// Durable queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to SQLite database file (default: offline-queue.db).
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Replay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Backend that relative queued URLs resolve against.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Connectivity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
    /// Initial connectivity when the platform reports nothing (default: true).
    #[serde(default = "default_assume_online")]
    pub assume_online: bool,
}

/// Background worker connection.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerChannelConfig {
    /// Base URL of the worker's HTTP surface. Unset means no worker.
    #[serde(default)]
    pub url: Option<String>,
    /// Seconds between reconnect attempts to the event stream (default: 5).
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("offline-queue.db")
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000/".to_string()
}

fn default_assume_online() -> bool {
    true
}

fn default_reconnect_secs() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            assume_online: default_assume_online(),
        }
    }
}

impl Default for WorkerChannelConfig {
    fn default() -> Self {
        Self {
            url: None,
            reconnect_secs: default_reconnect_secs(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Parsed backend base URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.replay.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.replay.base_url.clone(),
            source: e,
        })
    }

    /// Parsed worker base URL, if a worker is configured.
    pub fn worker_url(&self) -> Result<Option<Url>, ConfigError> {
        self.worker
            .url
            .as_deref()
            .map(|url| {
                Url::parse(url).map_err(|e| ConfigError::InvalidWorkerUrl {
                    url: url.to_string(),
                    source: e,
                })
            })
            .transpose()
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// The replay base URL is not absolute.
    #[error("invalid base url {url}: {source}")]
    InvalidBaseUrl {
        /// Configured value.
        url: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// The worker URL is not absolute.
    #[error("invalid worker url {url}: {source}")]
    InvalidWorkerUrl {
        /// Configured value.
        url: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
}
