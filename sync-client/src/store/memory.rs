//! In-memory queue store for testing.
//!
//! Behaves like the SQLite store and can be told to refuse opening, to
//! simulate a platform that denies durable storage.

use super::{now_millis, QueueStore, StoreError};
use async_trait::async_trait;
use offline_sync_types::{ActionId, NewAction, QueuedAction};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// In-memory queue store.
#[derive(Debug, Default, Clone)]
pub struct MemoryQueueStore {
    inner: Arc<Mutex<MemoryQueueInner>>,
}

#[derive(Debug, Default)]
struct MemoryQueueInner {
    last_id: i64,
    actions: BTreeMap<ActionId, QueuedAction>,
    unavailable: Option<String>,
}

impl MemoryQueueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose every operation fails with `Unavailable`.
    pub fn unavailable(reason: &str) -> Self {
        let store = Self::default();
        store.set_unavailable(Some(reason));
        store
    }

    /// Make subsequent operations fail (`Some`) or succeed (`None`).
    pub fn set_unavailable(&self, reason: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        inner.unavailable = reason.map(str::to_string);
    }

    fn check(inner: &MemoryQueueInner) -> Result<(), StoreError> {
        match &inner.unavailable {
            Some(reason) => Err(StoreError::Unavailable {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn open(&self) -> Result<(), StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check(&inner)
    }

    async fn append(&self, action: NewAction) -> Result<ActionId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check(&inner)?;

        inner.last_id += 1;
        let id = ActionId::new(inner.last_id);
        inner
            .actions
            .insert(id, QueuedAction::from_new(id, action, now_millis()));
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<QueuedAction>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check(&inner)?;
        Ok(inner.actions.values().cloned().collect())
    }

    async fn remove(&self, id: ActionId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check(&inner)?;
        Ok(inner.actions.remove(&id).is_some())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let inner = self.inner.lock().unwrap();
        Self::check(&inner)?;
        Ok(inner.actions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_sync_types::HttpMethod;

    fn visit() -> NewAction {
        NewAction::new("mark_visit_complete", HttpMethod::Post, "/route/stop/1/complete")
    }

    #[tokio::test]
    async fn memory_store_is_fifo() {
        let store = MemoryQueueStore::new();
        let a = store.append(visit()).await.unwrap();
        let b = store.append(visit()).await.unwrap();

        let ids: Vec<ActionId> = store.list().await.unwrap().iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[tokio::test]
    async fn memory_store_remove_absent_is_noop() {
        let store = MemoryQueueStore::new();
        assert!(!store.remove(ActionId::new(5)).await.unwrap());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = MemoryQueueStore::unavailable("storage denied");

        assert!(store.open().await.unwrap_err().is_unavailable());
        assert!(store.append(visit()).await.unwrap_err().is_unavailable());
        assert!(store.list().await.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryQueueStore::new();
        let clone = store.clone();
        store.append(visit()).await.unwrap();
        assert_eq!(clone.count().await.unwrap(), 1);
    }
}
