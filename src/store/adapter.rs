// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Typed, namespaced access over the host key-value store.
//!
//! The adapter is the single shared resource below the repositories: it adds
//! the `<namespace>:` key prefix and the JSON round-trip, nothing else.
//! Read-modify-write callers accept last-write-wins at this layer.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::traits::{LocalStore, StoreError};

#[derive(Clone)]
pub struct StoreAdapter {
    inner: Arc<dyn LocalStore>,
    namespace: String,
}

impl StoreAdapter {
    #[must_use]
    pub fn new(inner: Arc<dyn LocalStore>, namespace: impl Into<String>) -> Self {
        Self {
            inner,
            namespace: namespace.into(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Read and deserialize a value. A corrupt entry is logged and treated as
    /// absent rather than surfaced; the sync engine will rewrite it.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.inner.get(&self.scoped(key)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Discarding undeserializable store entry");
                Ok(None)
            }
        }
    }

    /// Serialize and write a value under the namespaced key.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })?;
        self.inner.set(&self.scoped(key), raw).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(&self.scoped(key)).await
    }

    /// Subscribe to the underlying store's change notifications.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<super::traits::StoreChange> {
        self.inner.subscribe()
    }
}
