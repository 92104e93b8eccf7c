//! SQLite storage backend for sync-worker.

use super::CacheStorage;
use crate::error::CacheStoreError;
use crate::fetch::FetchResponse;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Schema migrations, one entry per schema version. Append only.
const MIGRATIONS: &[&[&str]] = &[
    // v1
    &[
        r#"
        CREATE TABLE IF NOT EXISTS cache_buckets (
            name TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            bucket TEXT NOT NULL,
            request_key TEXT NOT NULL,
            status INTEGER NOT NULL,
            headers TEXT NOT NULL DEFAULT '{}',
            body BLOB NOT NULL,
            stored_at INTEGER NOT NULL,
            PRIMARY KEY (bucket, request_key)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_cache_entries_bucket ON cache_entries(bucket)",
    ],
    // v2: install completion and the bucket in control survive restarts
    &[
        "ALTER TABLE cache_buckets ADD COLUMN complete INTEGER NOT NULL DEFAULT 0",
        "ALTER TABLE cache_buckets ADD COLUMN active INTEGER NOT NULL DEFAULT 0",
    ],
];

/// SQLite-based cache bucket storage.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Debug, Clone)]
pub struct SqliteCacheStorage {
    pool: SqlitePool,
}

impl SqliteCacheStorage {
    /// Create a new SQLite storage from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, CacheStoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> Result<Self, CacheStoreError> {
        let options = SqliteConnectOptions::from_str(":memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Apply every migration above the stored `user_version`.
    async fn run_migrations(&self) -> Result<(), CacheStoreError> {
        let current: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;

        for (index, statements) in MIGRATIONS.iter().enumerate().skip(current.max(0) as usize) {
            let version = index as i64 + 1;
            let mut tx = self.pool.begin().await?;
            for statement in statements.iter() {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query(&format!("PRAGMA user_version = {}", version))
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::debug!(version, "cache schema migrated");
        }

        Ok(())
    }

    async fn ensure_bucket(
        tx: &mut Transaction<'_, Sqlite>,
        bucket: &str,
    ) -> Result<(), CacheStoreError> {
        sqlx::query("INSERT OR IGNORE INTO cache_buckets (name, created_at) VALUES (?1, ?2)")
            .bind(bucket)
            .bind(now_millis())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn write_entry(
        tx: &mut Transaction<'_, Sqlite>,
        bucket: &str,
        key: &str,
        response: &FetchResponse,
    ) -> Result<(), CacheStoreError> {
        let headers = serde_json::to_string(&response.headers).map_err(|e| {
            CacheStoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (bucket, request_key, status, headers, body, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(bucket, request_key) DO UPDATE SET
                status = excluded.status,
                headers = excluded.headers,
                body = excluded.body,
                stored_at = excluded.stored_at
            "#,
        )
        .bind(bucket)
        .bind(key)
        .bind(response.status as i64)
        .bind(headers)
        .bind(&response.body)
        .bind(now_millis())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl CacheStorage for SqliteCacheStorage {
    async fn bucket_names(&self) -> Result<Vec<String>, CacheStoreError> {
        let names = sqlx::query_scalar("SELECT name FROM cache_buckets ORDER BY created_at, name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        response: &FetchResponse,
    ) -> Result<(), CacheStoreError> {
        let mut tx = self.pool.begin().await?;
        Self::ensure_bucket(&mut tx, bucket).await?;
        Self::write_entry(&mut tx, bucket, key, response).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn put_all(
        &self,
        bucket: &str,
        entries: &[(String, FetchResponse)],
    ) -> Result<(), CacheStoreError> {
        let mut tx = self.pool.begin().await?;
        Self::ensure_bucket(&mut tx, bucket).await?;
        for (key, response) in entries {
            Self::write_entry(&mut tx, bucket, key, response).await?;
        }
        sqlx::query("UPDATE cache_buckets SET complete = 1 WHERE name = ?1")
            .bind(bucket)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn is_complete(&self, bucket: &str) -> Result<bool, CacheStoreError> {
        let complete: Option<i64> =
            sqlx::query_scalar("SELECT complete FROM cache_buckets WHERE name = ?1")
                .bind(bucket)
                .fetch_optional(&self.pool)
                .await?;
        Ok(complete == Some(1))
    }

    async fn set_active(&self, bucket: &str) -> Result<bool, CacheStoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE cache_buckets SET active = 0 WHERE name != ?1")
            .bind(bucket)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("UPDATE cache_buckets SET active = 1 WHERE name = ?1")
            .bind(bucket)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn active_bucket(&self) -> Result<Option<String>, CacheStoreError> {
        let name = sqlx::query_scalar(
            "SELECT name FROM cache_buckets WHERE active = 1 AND complete = 1 LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(name)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<FetchResponse>, CacheStoreError> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT request_key, status, headers, body
            FROM cache_entries
            WHERE bucket = ?1 AND request_key = ?2
            "#,
        )
        .bind(bucket)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FetchResponse::try_from).transpose()
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<bool, CacheStoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cache_entries WHERE bucket = ?1")
            .bind(bucket)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM cache_buckets WHERE name = ?1")
            .bind(bucket)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn entry_count(&self, bucket: &str) -> Result<u64, CacheStoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries WHERE bucket = ?1")
            .bind(bucket)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct EntryRow {
    request_key: String,
    status: i64,
    headers: String,
    body: Vec<u8>,
}

impl TryFrom<EntryRow> for FetchResponse {
    type Error = CacheStoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| CacheStoreError::Corrupt {
            key: row.request_key.clone(),
            reason,
        };

        let status = u16::try_from(row.status).map_err(|e| corrupt(e.to_string()))?;
        let headers: BTreeMap<String, String> =
            serde_json::from_str(&row.headers).map_err(|e| corrupt(e.to_string()))?;

        Ok(FetchResponse {
            status,
            headers,
            body: row.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> FetchResponse {
        FetchResponse::ok(body).with_header("Content-Type", "text/html")
    }

    #[tokio::test]
    async fn put_and_get() {
        let storage = SqliteCacheStorage::in_memory().await.unwrap();
        storage
            .put("candy-route-v1", "GET http://site.test/", &page("home"))
            .await
            .unwrap();

        let hit = storage
            .get("candy-route-v1", "GET http://site.test/")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.body, b"home");
        assert_eq!(hit.headers.get("content-type").unwrap(), "text/html");

        let miss = storage
            .get("candy-route-v2", "GET http://site.test/")
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn put_replaces_existing_entry() {
        let storage = SqliteCacheStorage::in_memory().await.unwrap();
        storage.put("b", "k", &page("old")).await.unwrap();
        storage.put("b", "k", &page("new")).await.unwrap();

        assert_eq!(storage.get("b", "k").await.unwrap().unwrap().body, b"new");
        assert_eq!(storage.entry_count("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn put_all_creates_bucket() {
        let storage = SqliteCacheStorage::in_memory().await.unwrap();
        let entries = vec![
            ("GET http://site.test/".to_string(), page("home")),
            ("GET http://site.test/route".to_string(), page("route")),
        ];

        storage.put_all("candy-route-v1", &entries).await.unwrap();

        assert!(storage.has_bucket("candy-route-v1").await.unwrap());
        assert_eq!(storage.entry_count("candy-route-v1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn put_all_marks_bucket_complete() {
        let storage = SqliteCacheStorage::in_memory().await.unwrap();
        storage.put("partial", "k", &page("x")).await.unwrap();
        storage
            .put_all("full", &[("k".to_string(), page("y"))])
            .await
            .unwrap();

        assert!(!storage.is_complete("partial").await.unwrap());
        assert!(storage.is_complete("full").await.unwrap());
        assert!(!storage.is_complete("missing").await.unwrap());
    }

    #[tokio::test]
    async fn only_one_complete_bucket_is_active() {
        let storage = SqliteCacheStorage::in_memory().await.unwrap();
        storage.put_all("v1", &[("k".to_string(), page("1"))]).await.unwrap();
        storage.put_all("v2", &[("k".to_string(), page("2"))]).await.unwrap();
        storage.put("v3", "k", &page("3")).await.unwrap();
        assert_eq!(storage.active_bucket().await.unwrap(), None);

        assert!(storage.set_active("v1").await.unwrap());
        assert_eq!(storage.active_bucket().await.unwrap().as_deref(), Some("v1"));

        assert!(storage.set_active("v2").await.unwrap());
        assert_eq!(storage.active_bucket().await.unwrap().as_deref(), Some("v2"));

        // An incomplete bucket never takes control.
        assert!(storage.set_active("v3").await.unwrap());
        assert_eq!(storage.active_bucket().await.unwrap(), None);

        assert!(!storage.set_active("gone").await.unwrap());
    }

    #[tokio::test]
    async fn delete_bucket_removes_entries() {
        let storage = SqliteCacheStorage::in_memory().await.unwrap();
        storage.put("old", "k", &page("x")).await.unwrap();
        storage.put("new", "k", &page("y")).await.unwrap();

        assert!(storage.delete_bucket("old").await.unwrap());
        assert!(!storage.delete_bucket("old").await.unwrap());

        assert_eq!(storage.bucket_names().await.unwrap(), vec!["new".to_string()]);
        assert_eq!(storage.entry_count("old").await.unwrap(), 0);
        assert!(storage.get("new", "k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let storage = SqliteCacheStorage::new(&path).await.unwrap();
            storage.put("b", "k", &page("kept")).await.unwrap();
        }

        {
            let storage = SqliteCacheStorage::new(&path).await.unwrap();
            storage.put_all("v1", &[("k".to_string(), page("v1"))]).await.unwrap();
            storage.set_active("v1").await.unwrap();
        }

        let reopened = SqliteCacheStorage::new(&path).await.unwrap();
        assert_eq!(reopened.get("b", "k").await.unwrap().unwrap().body, b"kept");
        assert_eq!(reopened.active_bucket().await.unwrap().as_deref(), Some("v1"));
    }
}
