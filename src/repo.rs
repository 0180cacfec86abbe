// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Repository layer: typed CRUD over one collection key in the local store,
//! fronted by an in-process read cache with hit/miss accounting.
//!
//! Each collection persists as a single namespaced key holding an
//! id -> entity JSON map. Reads served from the in-process cache count as
//! hits; reads that touch the adapter count as misses. Writes go through
//! read-modify-write against the adapter and update the cache entry in place,
//! so a caller always reads its own writes.
//!
//! Reads on the UI path never fail: local storage errors are logged and
//! degrade to absent/empty.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::model::Record;
use crate::store::{StoreAdapter, StoreError};

/// Hit/miss counters for one repository instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    /// `hits / total`, `0.0` when no requests have occurred.
    pub hit_rate: f64,
}

/// Anything the [`crate::monitor::CacheMonitor`] can aggregate.
pub trait CacheSource: Send + Sync {
    fn cache_stats(&self) -> CacheStats;
    fn reset_cache_stats(&self);
}

pub struct Repository<T: Record> {
    adapter: StoreAdapter,
    cache: DashMap<String, T>,
    /// Whole collection present in the cache; absence is then answerable
    /// without touching the adapter.
    primed: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Record> Repository<T> {
    #[must_use]
    pub fn new(adapter: StoreAdapter) -> Self {
        Self {
            adapter,
            cache: DashMap::new(),
            primed: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn collection_key() -> &'static str {
        T::KIND.table()
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_repo_read(T::KIND.table(), true);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_repo_read(T::KIND.table(), false);
    }

    /// Load the persisted collection map, degrading to empty on failure.
    async fn load_map(&self) -> BTreeMap<String, T> {
        match self.adapter.get(Self::collection_key()).await {
            Ok(Some(map)) => map,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!(collection = %T::KIND, error = %e, "Local read failed, treating collection as empty");
                BTreeMap::new()
            }
        }
    }

    fn prime(&self, map: &BTreeMap<String, T>) {
        self.cache.clear();
        for (id, entity) in map {
            self.cache.insert(id.clone(), entity.clone());
        }
        self.primed.store(true, Ordering::Release);
    }

    /// Get one record by id, tombstoned or not. Absent ids return `None`.
    pub async fn get(&self, id: &str) -> Option<T> {
        if let Some(entry) = self.cache.get(id) {
            self.record_hit();
            return Some(entry.value().clone());
        }
        if self.primed.load(Ordering::Acquire) {
            // Fully cached collection: absence is known without I/O.
            self.record_hit();
            return None;
        }

        self.record_miss();
        let map = self.load_map().await;
        self.prime(&map);
        map.get(id).cloned()
    }

    /// All records including tombstones (the sync view).
    pub async fn all(&self) -> Vec<T> {
        if self.primed.load(Ordering::Acquire) {
            self.record_hit();
            return self.cache.iter().map(|r| r.value().clone()).collect();
        }
        self.record_miss();
        let map = self.load_map().await;
        self.prime(&map);
        map.into_values().collect()
    }

    /// User-facing listing: tombstoned records excluded.
    pub async fn active(&self) -> Vec<T> {
        self.all().await.into_iter().filter(|r| !r.is_deleted()).collect()
    }

    /// The persisted map itself, uncached and uncounted (sync-engine input).
    pub async fn all_map(&self) -> BTreeMap<String, T> {
        self.load_map().await
    }

    /// Insert or replace a record (read-modify-write against the latest
    /// persisted map). The in-process cache entry is updated on success.
    pub async fn upsert(&self, entity: T) -> Result<(), StoreError> {
        let mut map = self.load_map().await;
        map.insert(entity.id().to_string(), entity.clone());
        self.adapter.set(Self::collection_key(), &map).await?;
        self.cache.insert(entity.id().to_string(), entity);
        Ok(())
    }

    /// Tombstone a record. Never erases: the record stays in the collection
    /// with `deleted = true` and a bumped `updated_at` so the deletion
    /// propagates through sync. Unknown ids are a no-op.
    pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let mut map = self.load_map().await;
        let Some(entity) = map.get_mut(id) else {
            debug!(collection = %T::KIND, id, "Remove of unknown id ignored");
            return Ok(());
        };
        entity.tombstone();
        let tombstoned = entity.clone();
        self.adapter.set(Self::collection_key(), &map).await?;
        self.cache.insert(id.to_string(), tombstoned);
        Ok(())
    }

    /// Replace the whole persisted collection in one write (merge commit).
    /// The cache is re-primed from the new map.
    pub async fn replace_all(&self, map: &BTreeMap<String, T>) -> Result<(), StoreError> {
        self.adapter.set(Self::collection_key(), map).await?;
        self.prime(map);
        Ok(())
    }

    /// Drop the in-process cache; the next read goes to the adapter.
    pub fn invalidate(&self) {
        self.cache.clear();
        self.primed.store(false, Ordering::Release);
    }
}

impl<T: Record> CacheSource for Repository<T> {
    fn cache_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            total,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    fn reset_cache_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tag;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn repo() -> Repository<Tag> {
        let store = Arc::new(MemoryStore::default());
        Repository::new(StoreAdapter::new(store, "sync"))
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let repo = repo();
        assert!(repo.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let repo = repo();
        let tag = Tag::new("reading");
        let id = tag.id.clone();
        repo.upsert(tag).await.unwrap();

        let back = repo.get(&id).await.unwrap();
        assert_eq!(back.name, "reading");
    }

    #[tokio::test]
    async fn test_first_read_misses_then_hits() {
        let repo = repo();
        let tag = Tag::new("a");
        let id = tag.id.clone();
        repo.upsert(tag).await.unwrap();
        repo.invalidate();
        repo.reset_cache_stats();

        repo.get(&id).await;
        let stats = repo.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);

        repo.get(&id).await;
        repo.get(&id).await;
        let stats = repo.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_hit_rate_zero_without_requests() {
        let repo = repo();
        let stats = repo.cache_stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[tokio::test]
    async fn test_read_your_writes() {
        let repo = repo();
        let mut tag = Tag::new("a");
        let id = tag.id.clone();
        repo.upsert(tag.clone()).await.unwrap();

        tag.name = "b".into();
        tag.touch();
        repo.upsert(tag).await.unwrap();

        assert_eq!(repo.get(&id).await.unwrap().name, "b");
    }

    #[tokio::test]
    async fn test_remove_tombstones_not_erases() {
        let repo = repo();
        let tag = Tag::new("doomed");
        let id = tag.id.clone();
        let created_updated_at = tag.updated_at;
        repo.upsert(tag).await.unwrap();
        repo.remove(&id).await.unwrap();

        // Still reachable by id, flagged and bumped.
        let back = repo.get(&id).await.unwrap();
        assert!(back.deleted);
        assert!(back.updated_at > created_updated_at);

        // Participates in the sync view, excluded from the user-facing one.
        assert_eq!(repo.all().await.len(), 1);
        assert!(repo.active().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_id_is_noop() {
        let repo = repo();
        assert!(repo.remove("ghost").await.is_ok());
        assert!(repo.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_all_primes_cache() {
        let repo = repo();
        repo.upsert(Tag::new("a")).await.unwrap();
        repo.upsert(Tag::new("b")).await.unwrap();
        repo.invalidate();
        repo.reset_cache_stats();

        assert_eq!(repo.all().await.len(), 2);
        assert_eq!(repo.cache_stats().misses, 1);

        // Primed: repeat collection reads and absence checks are hits.
        repo.all().await;
        assert!(repo.get("ghost").await.is_none());
        let stats = repo.cache_stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_replace_all_reprimes() {
        let repo = repo();
        repo.upsert(Tag::new("old")).await.unwrap();

        let fresh = Tag::new("fresh");
        let mut map = BTreeMap::new();
        map.insert(fresh.id.clone(), fresh.clone());
        repo.replace_all(&map).await.unwrap();

        let all = repo.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "fresh");
    }

    #[tokio::test]
    async fn test_reset_cache_stats() {
        let repo = repo();
        repo.get("x").await;
        repo.reset_cache_stats();
        let stats = repo.cache_stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }
}
