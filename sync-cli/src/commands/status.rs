//! Show queue status.

use anyhow::Result;
use offline_sync_client::{ClientConfig, QueueStore, SqliteQueueStore, SCHEMA_VERSION};

/// Run the status command.
pub async fn run(config: &ClientConfig) -> Result<()> {
    println!("=== offline-sync status ===");
    println!();

    println!("Queue:");
    println!("  Database: {}", config.store.database.display());
    println!("  Schema:   v{}", SCHEMA_VERSION);

    let store = SqliteQueueStore::new(&config.store.database);
    match store.list().await {
        Ok(actions) => {
            println!("  Pending:  {}", actions.len());
            if let Some(oldest) = actions.first() {
                println!("  Oldest:   {}", format_age(oldest.timestamp, now_millis()));
            }
        }
        Err(e) => {
            println!("  Pending:  UNAVAILABLE ({})", e);
        }
    }

    println!();
    println!("Backend:");
    println!("  Base URL: {}", config.replay.base_url);

    Ok(())
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Format the age of a unix-millisecond timestamp.
fn format_age(then: i64, now: i64) -> String {
    let diff = (now.saturating_sub(then) / 1000).max(0);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_sync_types::{HttpMethod, NewAction};
    use tempfile::tempdir;

    #[tokio::test]
    async fn status_with_empty_queue() {
        let dir = tempdir().unwrap();
        let mut config = ClientConfig::default();
        config.store.database = dir.path().join("queue.db");

        assert!(run(&config).await.is_ok());
    }

    #[tokio::test]
    async fn status_with_pending_actions() {
        let dir = tempdir().unwrap();
        let mut config = ClientConfig::default();
        config.store.database = dir.path().join("queue.db");

        let store = SqliteQueueStore::new(&config.store.database);
        store
            .append(NewAction::new("log_visit", HttpMethod::Post, "/visits/log"))
            .await
            .unwrap();

        assert!(run(&config).await.is_ok());
    }

    #[tokio::test]
    async fn status_survives_unopenable_database() {
        let dir = tempdir().unwrap();
        let mut config = ClientConfig::default();
        // A directory cannot be opened as a database.
        config.store.database = dir.path().to_path_buf();

        assert!(run(&config).await.is_ok());
    }

    #[test]
    fn format_age_works() {
        let now = 1_000_000_000;

        assert_eq!(format_age(now, now), "just now");
        assert!(format_age(now - 120_000, now).contains("minutes"));
        assert!(format_age(now - 7_200_000, now).contains("hours"));
        assert!(format_age(now - 172_800_000, now).contains("days"));
    }
}
