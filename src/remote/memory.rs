use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

use super::traits::{RemoteError, RemoteStore};
use crate::query::PullQuery;

/// In-memory [`RemoteStore`] for tests and local development.
///
/// Rows are keyed by their `id` field per table. The offline toggle makes
/// every call fail, for exercising the engine's failure semantics.
pub struct InMemoryRemote {
    tables: DashMap<String, DashMap<String, Value>>,
    offline: AtomicBool,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            offline: AtomicBool::new(false),
        }
    }

    /// Make subsequent calls fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Seed a row directly, as another device's push would.
    pub fn seed(&self, table: &str, row: Value) {
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(id, row);
    }

    /// Row count for one table.
    #[must_use]
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.len())
    }

    #[must_use]
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// Fetch one row by id, bypassing filters (test helper).
    #[must_use]
    pub fn row(&self, table: &str, id: &str) -> Option<Value> {
        self.tables
            .get(table)
            .and_then(|t| t.get(id).map(|r| r.value().clone()))
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::Relaxed) {
            Err(RemoteError::Fetch("remote unreachable".into()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn select(&self, query: &PullQuery) -> Result<Vec<Value>, RemoteError> {
        self.check_online()?;
        let Some(table) = self.tables.get(&query.table) else {
            return Ok(Vec::new());
        };
        Ok(table
            .iter()
            .filter(|r| query.matches(r.value()))
            .map(|r| r.value().clone())
            .collect())
    }

    async fn upsert(&self, table: &str, rows: &[Value]) -> Result<(), RemoteError> {
        self.check_online()
            .map_err(|_| RemoteError::Upsert("remote unreachable".into()))?;
        let table = self.tables.entry(table.to_string()).or_default();
        for row in rows {
            let id = row
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| RemoteError::Upsert("row missing id".into()))?;
            table.insert(id.to_string(), row.clone());
        }
        Ok(())
    }
}
