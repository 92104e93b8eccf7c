//! Configuration loading for sync-worker.
//!
//! Configuration is loaded from a TOML file (default: `worker.toml`).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Root configuration for sync-worker.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerConfig {
    /// Cache bucket configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Interception scope.
    #[serde(default)]
    pub scope: ScopeConfig,
    /// Precache manifest.
    #[serde(default)]
    pub manifest: ManifestConfig,
    /// Background sync configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// HTTP endpoints configuration.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Cache bucket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Bucket name prefix (default: candy-route).
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Build version; bump it to roll a new bucket (default: v1).
    #[serde(default = "default_version")]
    pub version: String,
    /// Path to SQLite database file (default: worker-cache.db).
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Activate right after install instead of waiting (default: true).
    #[serde(default = "default_skip_waiting")]
    pub skip_waiting: bool,
}

/// Interception scope.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Site origin that relative URLs resolve against.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Cross-origin hosts whose GET responses are cached.
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    /// Path prefix of the JSON API (network-first).
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Page served when a navigation has neither network nor cache.
    #[serde(default = "default_fallback_page")]
    pub fallback_page: String,
}

/// Precache manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestConfig {
    /// URLs fetched verbatim at install.
    #[serde(default = "default_manifest_urls")]
    pub urls: Vec<String>,
}

/// Background sync configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Tag that makes the worker ask pages to drain their queues.
    #[serde(default = "default_sync_tag")]
    pub tag: String,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Bind address for HTTP server (default: 127.0.0.1:8080).
    #[serde(default = "default_http_bind")]
    pub bind_address: String,
}

// Default value functions
fn default_prefix() -> String {
    "candy-route".to_string()
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("worker-cache.db")
}

fn default_skip_waiting() -> bool {
    true
}

fn default_origin() -> String {
    "http://127.0.0.1:5000/".to_string()
}

fn default_api_prefix() -> String {
    "/api/".to_string()
}

fn default_fallback_page() -> String {
    "/".to_string()
}

fn default_manifest_urls() -> Vec<String> {
    ["/", "/route", "/customers", "/balances"]
        .iter()
        .map(|url| url.to_string())
        .collect()
}

fn default_sync_tag() -> String {
    "sync-offline-actions".to_string()
}

fn default_http_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            version: default_version(),
            database: default_database_path(),
            skip_waiting: default_skip_waiting(),
        }
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            allowed_hosts: Vec::new(),
            api_prefix: default_api_prefix(),
            fallback_page: default_fallback_page(),
        }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            urls: default_manifest_urls(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tag: default_sync_tag(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_http_bind(),
        }
    }
}

impl WorkerConfig {
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

    /// Parsed site origin.
    pub fn origin(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.scope.origin).map_err(|e| ConfigError::InvalidOrigin {
            origin: self.scope.origin.clone(),
            source: e,
        })
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
    /// The site origin is not an absolute URL.
    #[error("invalid origin {origin}: {source}")]
    InvalidOrigin {
        /// Configured value.
        origin: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = WorkerConfig::default();
        assert_eq!(config.cache.prefix, "candy-route");
        assert!(config.cache.skip_waiting);
        assert_eq!(config.sync.tag, "sync-offline-actions");
        assert_eq!(config.manifest.urls[0], "/");
        assert!(config.origin().is_ok());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[cache]
version = "v7"
database = "/var/lib/worker/cache.db"
skip_waiting = false

[scope]
origin = "https://routes.example.com/"
allowed_hosts = ["unpkg.com", "cdn.jsdelivr.net"]
api_prefix = "/api/"

[manifest]
urls = ["/", "/static/app.js", "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"]

[sync]
tag = "drain"

[http]
bind_address = "0.0.0.0:9090"
"#;

        let config: WorkerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.version, "v7");
        assert_eq!(config.cache.prefix, "candy-route");
        assert!(!config.cache.skip_waiting);
        assert_eq!(config.scope.allowed_hosts.len(), 2);
        assert_eq!(config.manifest.urls.len(), 3);
        assert_eq!(config.sync.tag, "drain");
        assert_eq!(config.http.bind_address, "0.0.0.0:9090");
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let toml = r#"
[cache]
[scope]
"#;

        let config: WorkerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.version, "v1");
        assert_eq!(config.scope.fallback_page, "/");
        assert_eq!(config.http.bind_address, "127.0.0.1:8080");
    }

    #[test]
    fn bad_origin_is_rejected() {
        let mut config = WorkerConfig::default();
        config.scope.origin = "not a url".into();
        assert!(matches!(
            config.origin(),
            Err(ConfigError::InvalidOrigin { .. })
        ));
    }
}
