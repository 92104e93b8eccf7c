//! Show queued actions.

use anyhow::{Context, Result};
use offline_sync_client::{ClientConfig, QueueStore, SqliteQueueStore};
use offline_sync_types::QueuedAction;

/// Run the list command.
pub async fn run(config: &ClientConfig, json: bool) -> Result<()> {
    let store = SqliteQueueStore::new(&config.store.database);
    let actions = store.list().await.context("Failed to read queue")?;

    if json {
        for action in &actions {
            println!("{}", action.to_json()?);
        }
        return Ok(());
    }

    if actions.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    println!("{:>6}  {:<7} {:<20} URL", "ID", "METHOD", "TYPE");
    for action in &actions {
        println!("{}", format_row(action));
    }
    println!();
    println!("{} action(s) pending", actions.len());
    Ok(())
}

fn format_row(action: &QueuedAction) -> String {
    format!(
        "{:>6}  {:<7} {:<20} {} ({} bytes)",
        action.id.value(),
        action.method.as_str(),
        action.action_type.as_str(),
        action.url,
        action.body.len()
    )
}
