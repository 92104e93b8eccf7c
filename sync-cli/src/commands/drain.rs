//! Replay the queue against the backend.

use anyhow::{Context, Result};
use offline_sync_client::{
    ClientConfig, Notification, NotificationPresenter, PageRuntime, QueueStore,
};
use offline_sync_core::DrainReport;
use std::sync::Arc;

/// Prints notifications to stdout.
struct ConsolePresenter;

impl NotificationPresenter for ConsolePresenter {
    fn present(&self, notification: Notification) {
        println!("{}", notification.message);
    }
}

/// Run the drain command.
pub async fn run(config: &ClientConfig) -> Result<DrainReport> {
    let runtime = PageRuntime::from_config(config, Arc::new(ConsolePresenter))?;
    let coordinator = runtime.coordinator();

    coordinator
        .store()
        .open()
        .await
        .context("Failed to open queue")?;

    let report = coordinator.drain().await?;

    if report.attempted == 0 {
        println!("Queue is empty.");
    } else if !report.failed.is_empty() {
        println!(
            "{} action(s) still pending, run 'offline-sync drain' again later",
            report.failed.len()
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_sync_client::SqliteQueueStore;
    use offline_sync_types::{HttpMethod, NewAction};
    use tempfile::tempdir;

    #[tokio::test]
    async fn drain_empty_queue() {
        let dir = tempdir().unwrap();
        let mut config = ClientConfig::default();
        config.store.database = dir.path().join("queue.db");

        let report = run(&config).await.unwrap();
        assert_eq!(report.attempted, 0);
    }

    #[tokio::test]
    async fn unreachable_backend_keeps_actions() {
        let dir = tempdir().unwrap();
        let mut config = ClientConfig::default();
        config.store.database = dir.path().join("queue.db");
        // Port 9 (discard) is closed on any sane test host.
        config.replay.base_url = "http://127.0.0.1:9/".to_string();

        let store = SqliteQueueStore::new(&config.store.database);
        store
            .append(NewAction::new("record_payment", HttpMethod::Post, "/payments/record"))
            .await
            .unwrap();

        let report = run(&config).await.unwrap();
        assert_eq!(report.attempted, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
