//! SQLite queue store.

use super::{now_millis, QueueStore, StoreError};
use async_trait::async_trait;
use offline_sync_types::{ActionId, ActionType, NewAction, QueuedAction};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::OnceCell;

/// Additive schema migrations, one entry per schema version.
///
/// Never edit or remove an entry; append a new one instead.
const MIGRATIONS: &[&[&str]] = &[
    // v1
    &[
        r#"
        CREATE TABLE IF NOT EXISTS offline_actions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            action_type TEXT NOT NULL,
            url TEXT NOT NULL,
            method TEXT NOT NULL,
            headers TEXT NOT NULL DEFAULT '{}',
            body BLOB NOT NULL,
            timestamp INTEGER NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_offline_actions_timestamp ON offline_actions(timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_offline_actions_type ON offline_actions(action_type)",
    ],
];

/// Schema version written by this build.
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-based queue store.
///
/// The database is opened lazily on first use. `AUTOINCREMENT` keeps ids
/// monotonic even after the newest row is removed.
#[derive(Debug)]
pub struct SqliteQueueStore {
    location: Location,
    pool: OnceCell<SqlitePool>,
}

impl SqliteQueueStore {
    /// Create a store backed by the database file at `path`.
    ///
    /// Nothing touches the disk until the store is opened.
    pub fn new(path: &Path) -> Self {
        Self {
            location: Location::File(path.to_path_buf()),
            pool: OnceCell::new(),
        }
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<&SqlitePool, StoreError> {
        self.pool.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<SqlitePool, StoreError> {
        let unavailable = |e: sqlx::Error| StoreError::Unavailable {
            reason: e.to_string(),
        };

        let pool = match &self.location {
            Location::File(path) => {
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                    .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                    .busy_timeout(std::time::Duration::from_secs(5));

                SqlitePoolOptions::new()
                    .max_connections(4)
                    .connect_with(options)
                    .await
                    .map_err(unavailable)?
            }
            Location::Memory => {
                let options = SqliteConnectOptions::from_str(":memory:").map_err(unavailable)?;

                // A single connection that never expires, or the data vanishes.
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await
                    .map_err(unavailable)?
            }
        };

        run_migrations(&pool).await.map_err(unavailable)?;
        tracing::debug!(location = ?self.location, "queue store opened");
        Ok(pool)
    }
}

/// Apply every migration above the stored `user_version`.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    for (index, statements) in MIGRATIONS.iter().enumerate().skip(current.max(0) as usize) {
        let version = index as i64 + 1;
        let mut tx = pool.begin().await?;
        for statement in statements.iter() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        // PRAGMA does not accept bound parameters.
        sqlx::query(&format!("PRAGMA user_version = {}", version))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(version, "queue schema migrated");
    }

    Ok(())
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn open(&self) -> Result<(), StoreError> {
        self.pool().await.map(|_| ())
    }

    async fn append(&self, action: NewAction) -> Result<ActionId, StoreError> {
        let pool = self.pool().await?;
        let headers = serde_json::to_string(&action.headers).map_err(|e| StoreError::Corrupt {
            id: 0,
            reason: e.to_string(),
        })?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO offline_actions (action_type, url, method, headers, body, timestamp, synced)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
            RETURNING id
            "#,
        )
        .bind(action.action_type.as_str())
        .bind(&action.url)
        .bind(action.method.as_str())
        .bind(headers)
        .bind(&action.body)
        .bind(now_millis())
        .fetch_one(pool)
        .await?;

        Ok(ActionId::new(id))
    }

    async fn list(&self) -> Result<Vec<QueuedAction>, StoreError> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT id, action_type, url, method, headers, body, timestamp, synced
            FROM offline_actions
            ORDER BY id ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(QueuedAction::try_from).collect()
    }

    async fn remove(&self, id: ActionId) -> Result<bool, StoreError> {
        let pool = self.pool().await?;
        let result = sqlx::query("DELETE FROM offline_actions WHERE id = ?1")
            .bind(id.value())
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let pool = self.pool().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offline_actions")
            .fetch_one(pool)
            .await?;

        Ok(count as usize)
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct ActionRow {
    id: i64,
    action_type: String,
    url: String,
    method: String,
    headers: String,
    body: Vec<u8>,
    timestamp: i64,
    synced: bool,
}

impl TryFrom<ActionRow> for QueuedAction {
    type Error = StoreError;

    fn try_from(row: ActionRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt { id: row.id, reason };

        let method = row.method.parse().map_err(|e| corrupt(format!("{}", e)))?;
        let headers: BTreeMap<String, String> =
            serde_json::from_str(&row.headers).map_err(|e| corrupt(e.to_string()))?;

        Ok(QueuedAction {
            id: ActionId::new(row.id),
            action_type: ActionType::new(row.action_type),
            url: row.url,
            method,
            headers,
            body: row.body,
            timestamp: row.timestamp,
            synced: row.synced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_sync_types::HttpMethod;

    fn payment(amount: &str) -> NewAction {
        NewAction::new("record_payment", HttpMethod::Post, "/payments/record")
            .with_body(format!("customer_id=7&amount={}", amount))
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let store = SqliteQueueStore::in_memory();
        store.open().await.unwrap();
        store.open().await.unwrap();

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(store.pool().await.unwrap())
            .await
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn indexes_exist() {
        let store = SqliteQueueStore::in_memory();
        store.open().await.unwrap();

        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'offline_actions'",
        )
        .fetch_all(store.pool().await.unwrap())
        .await
        .unwrap();

        assert!(names.contains(&"idx_offline_actions_timestamp".to_string()));
        assert!(names.contains(&"idx_offline_actions_type".to_string()));
    }

    #[tokio::test]
    async fn append_stamps_and_lists_in_order() {
        let store = SqliteQueueStore::in_memory();

        let id1 = store.append(payment("10")).await.unwrap();
        let id2 = store.append(payment("20")).await.unwrap();
        let id3 = store
            .append(NewAction::new(
                "mark_visit_complete",
                HttpMethod::Post,
                "/route/stop/3/complete",
            ))
            .await
            .unwrap();

        assert!(id1 < id2 && id2 < id3);

        let actions = store.list().await.unwrap();
        let ids: Vec<ActionId> = actions.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![id1, id2, id3]);
        assert!(actions.iter().all(|a| !a.synced));
        assert!(actions.iter().all(|a| a.timestamp > 0));
        assert_eq!(actions[2].action_type.as_str(), "mark_visit_complete");
    }

    #[tokio::test]
    async fn headers_and_body_survive() {
        let store = SqliteQueueStore::in_memory();
        let action = payment("12.50").with_header("X-CSRFToken", "abc123");

        store.append(action.clone()).await.unwrap();
        let stored = store.list().await.unwrap().remove(0);

        assert_eq!(stored.headers, action.headers);
        assert_eq!(stored.body, action.body);
        assert_eq!(stored.method, HttpMethod::Post);
        assert_eq!(stored.url, "/payments/record");
    }

    #[tokio::test]
    async fn remove_deletes_by_id() {
        let store = SqliteQueueStore::in_memory();
        let id1 = store.append(payment("10")).await.unwrap();
        let id2 = store.append(payment("20")).await.unwrap();

        assert!(store.remove(id1).await.unwrap());

        let remaining = store.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, id2);
    }

    #[tokio::test]
    async fn remove_absent_id_is_noop() {
        let store = SqliteQueueStore::in_memory();
        store.append(payment("10")).await.unwrap();

        let removed = store.remove(ActionId::new(999)).await.unwrap();

        assert!(!removed);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_removal() {
        let store = SqliteQueueStore::in_memory();
        let id1 = store.append(payment("10")).await.unwrap();
        store.remove(id1).await.unwrap();

        let id2 = store.append(payment("20")).await.unwrap();
        assert!(id2 > id1);
    }

    #[tokio::test]
    async fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        {
            let store = SqliteQueueStore::new(&path);
            store.append(payment("10")).await.unwrap();
            store.append(payment("20")).await.unwrap();
        }

        let reopened = SqliteQueueStore::new(&path);
        let actions = reopened.list().await.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].body, b"customer_id=7&amount=10");
    }

    #[tokio::test]
    async fn missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does/not/exist/queue.db");

        let store = SqliteQueueStore::new(&path);
        let err = store.open().await.unwrap_err();

        assert!(err.is_unavailable());
    }
}
