use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::query::PullQuery;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Remote fetch failed: {0}")]
    Fetch(String),
    #[error("Remote upsert failed: {0}")]
    Upsert(String),
    #[error("Remote call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// The remote relational store, at its interface boundary.
///
/// Supports per-table filtered reads (equality on the owner column,
/// greater-than on the update-timestamp column) and batch upserts.
/// Rows travel as JSON objects; the engine owns (de)serialization.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, query: &PullQuery) -> Result<Vec<Value>, RemoteError>;
    async fn upsert(&self, table: &str, rows: &[Value]) -> Result<(), RemoteError>;
}
