//! Storage layer for sync-worker.
//!
//! Named cache buckets holding request/response pairs. A bucket is written
//! once at install (all entries in one transaction), read during
//! interception and deleted wholesale when a newer version activates.

mod sqlite;

pub use sqlite::SqliteCacheStorage;

use crate::error::CacheStoreError;
use crate::fetch::FetchResponse;
use async_trait::async_trait;

/// Trait for cache bucket storage backends.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of every bucket, oldest first.
    async fn bucket_names(&self) -> Result<Vec<String>, CacheStoreError>;

    /// Check if a bucket exists.
    async fn has_bucket(&self, bucket: &str) -> Result<bool, CacheStoreError> {
        Ok(self.bucket_names().await?.iter().any(|name| name == bucket))
    }

    /// Store one entry, creating the bucket if needed.
    ///
    /// Replaces any entry with the same key.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        response: &FetchResponse,
    ) -> Result<(), CacheStoreError>;

    /// Store many entries atomically, creating the bucket if needed, and
    /// mark the bucket complete.
    ///
    /// Either every entry is written or none is.
    async fn put_all(
        &self,
        bucket: &str,
        entries: &[(String, FetchResponse)],
    ) -> Result<(), CacheStoreError>;

    /// Whether a [`put_all`](Self::put_all) into this bucket has committed.
    async fn is_complete(&self, bucket: &str) -> Result<bool, CacheStoreError>;

    /// Record `bucket` as the one in control, clearing the flag on every
    /// other bucket.
    ///
    /// Returns `false` if the bucket does not exist.
    async fn set_active(&self, bucket: &str) -> Result<bool, CacheStoreError>;

    /// The complete bucket last recorded as in control, if any.
    async fn active_bucket(&self) -> Result<Option<String>, CacheStoreError>;

    /// Look up an entry.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<FetchResponse>, CacheStoreError>;

    /// Delete a bucket and all its entries.
    ///
    /// Returns `false` if the bucket did not exist.
    async fn delete_bucket(&self, bucket: &str) -> Result<bool, CacheStoreError>;

    /// Number of entries in a bucket.
    async fn entry_count(&self, bucket: &str) -> Result<u64, CacheStoreError>;
}
