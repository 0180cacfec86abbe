use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Serialization error for '{key}': {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Keys that changed in one store mutation, with the namespace they live in.
///
/// Delivered on the change-notification channel so the UI layer can refresh
/// affected views without polling.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub namespace: String,
    pub keys: Vec<String>,
}

/// The host's persistent key-value store, at its interface boundary.
///
/// Every call is a suspension point; nothing is assumed to complete
/// synchronously. Concurrent writers get last-write-wins at this layer
/// (no transactions).
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;

    /// Subscribe to change notifications. A receiver that lags simply misses
    /// notifications; the store itself remains authoritative.
    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StoreChange>;
}
