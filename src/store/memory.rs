use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use super::traits::{LocalStore, StoreChange, StoreError};

/// In-memory [`LocalStore`] used by tests and as a host-store stand-in.
pub struct MemoryStore {
    data: DashMap<String, String>,
    namespace: String,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            data: DashMap::new(),
            namespace: namespace.into(),
            changes,
        }
    }

    /// Current key count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn notify(&self, keys: Vec<String>) {
        // No receivers is fine; notification is best-effort.
        let _ = self.changes.send(StoreChange {
            namespace: self.namespace.clone(),
            keys,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("local")
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.data.get(key).map(|r| r.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), value);
        self.notify(vec![key.to_string()]);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.data.remove(key);
        self.notify(vec![key.to_string()]);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let keys: Vec<String> = self.data.iter().map(|r| r.key().clone()).collect();
        self.data.clear();
        self.notify(keys);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::default();
        store.set("k", "v".into()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryStore::default();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryStore::default();
        store.set("k", "v".into()).await.unwrap();
        store.remove("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let store = MemoryStore::default();
        assert!(store.remove("nope").await.is_ok());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryStore::default();
        for i in 0..5 {
            store.set(&format!("k{i}"), "v".into()).await.unwrap();
        }
        store.clear().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_change_notification_carries_namespace_and_keys() {
        let store = MemoryStore::new("sync");
        let mut rx = store.subscribe();

        store.set("tags", "{}".into()).await.unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.namespace, "sync");
        assert_eq!(change.keys, vec!["tags".to_string()]);
    }

    #[tokio::test]
    async fn test_set_without_subscribers_is_ok() {
        let store = MemoryStore::default();
        assert!(store.set("k", "v".into()).await.is_ok());
    }
}
