//! Error types for sync-worker.

/// Main error type for sync-worker operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Cache storage error.
    #[error("storage error: {0}")]
    Storage(#[from] CacheStoreError),

    /// A manifest resource could not be fetched at install.
    #[error("precache failed for {url}: {reason}")]
    Precache {
        /// The manifest URL.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// Neither the network nor the cache could answer a request.
    #[error("interception failed for {url}: {reason}")]
    Interception {
        /// The requested URL.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cache storage errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheStoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored entry could not be decoded.
    #[error("corrupt cache entry {key}: {reason}")]
    Corrupt {
        /// Entry key.
        key: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Result type alias for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, CacheStoreError>;
