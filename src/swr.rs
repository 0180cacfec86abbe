// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Stale-while-revalidate cache controller: the read path the UI layer uses.
//!
//! Fresh cached data is returned immediately, with revalidation pushed to a
//! detached background task whose errors are logged and never surfaced to the
//! caller that already has data. Absent or expired entries make the caller
//! await the fetch; a refetch that fails while a stale copy exists degrades to
//! that copy, and the error surfaces only when the store holds nothing for the
//! key. A companion authoritative-first read prefers a live fetch and degrades
//! to the cache only when the fetch fails outright.
//!
//! Cache writes are guarded by resource identity: an entry is keyed by the
//! page's own canonical URL, and a write whose record does not canonically
//! match the target key is dropped as a consistency hazard.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::model::{now_millis, TaggedPage};
use crate::remote::RemoteError;
use crate::store::{StoreAdapter, StoreError};
use crate::url_norm::canonical_key;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Fetch(#[from] RemoteError),
}

/// A cached value annotated with its fetch timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry<T> {
    pub value: T,
    /// Epoch millis at which `value` was fetched.
    pub fetched_at: i64,
}

/// Debounce guard for background revalidation triggers.
#[derive(Debug, Default)]
struct DebounceState {
    last_key: Option<String>,
    last_at: Option<Instant>,
}

pub struct CacheController {
    adapter: StoreAdapter,
    stale_time: Option<Duration>,
    debounce_window: Duration,
    debounce: Mutex<DebounceState>,
}

impl CacheController {
    #[must_use]
    pub fn new(adapter: StoreAdapter, config: &SyncConfig) -> Self {
        Self {
            adapter,
            stale_time: config.stale_time_ms.map(Duration::from_millis),
            debounce_window: Duration::from_millis(config.debounce_ms),
            debounce: Mutex::new(DebounceState::default()),
        }
    }

    fn entry_key(key: &str) -> String {
        format!("query:{key}")
    }

    fn is_fresh(&self, entry_fetched_at: i64) -> bool {
        match self.stale_time {
            // Unset stale time means never expire.
            None => true,
            Some(limit) => {
                let age = now_millis().saturating_sub(entry_fetched_at);
                age >= 0 && (age as u128) < limit.as_millis()
            }
        }
    }

    async fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CachedEntry<T>> {
        match self.adapter.get(&Self::entry_key(key)).await {
            Ok(entry) => entry,
            Err(e) => {
                // A broken local read never blocks the caller; treat as absent.
                warn!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    async fn persist<T: Serialize>(&self, key: &str, value: &T) {
        let entry = CachedEntry {
            value,
            fetched_at: now_millis(),
        };
        if let Err(e) = self.adapter.set(&Self::entry_key(key), &entry).await {
            // The caller already has the value; persistence is upkeep.
            warn!(key, error = %e, "Failed to persist cache entry");
        }
    }

    /// Stale-while-revalidate read.
    ///
    /// Fresh cache: returned immediately; if `revalidate` is supplied it runs
    /// in a detached task, debounced per key, errors swallowed into the log.
    /// Stale or absent: `fetch` is awaited, persisted with a fresh timestamp,
    /// and returned. A failed fetch falls back to the stale entry when one
    /// exists; the error surfaces only when there is no entry at all.
    pub async fn get_or_fetch<T, F, Fut, R, RFut, E>(
        &self,
        key: &str,
        fetch: F,
        revalidate: Option<R>,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
        R: FnOnce() -> RFut + Send + 'static,
        RFut: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let mut cached = self.read_entry::<T>(key).await;
        if let Some(entry) = cached.take() {
            if self.is_fresh(entry.fetched_at) {
                crate::metrics::record_swr_read("fresh");
                if let Some(revalidate) = revalidate {
                    self.trigger_revalidation(key, revalidate);
                }
                return Ok(entry.value);
            }
            crate::metrics::record_swr_read("stale");
            cached = Some(entry);
        } else {
            crate::metrics::record_swr_read("absent");
        }

        match fetch().await {
            Ok(value) => {
                self.persist(key, &value).await;
                crate::metrics::record_swr_read("fetched");
                Ok(value)
            }
            // Local-first: an expired entry still beats no data at all.
            Err(fetch_err) => match cached {
                Some(entry) => {
                    warn!(key, error = %fetch_err, "Refetch failed, serving stale cached value");
                    crate::metrics::record_swr_read("fallback");
                    Ok(entry.value)
                }
                None => Err(fetch_err.into()),
            },
        }
    }

    /// Authoritative-first read: live fetch preferred, cache as fallback.
    ///
    /// If both the fetch and the fallback come up empty, the *original* fetch
    /// error is surfaced, not the fallback's.
    pub async fn get_authoritative<T, F, Fut>(&self, key: &str, fetch: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        match fetch().await {
            Ok(value) => {
                self.persist(key, &value).await;
                Ok(value)
            }
            Err(fetch_err) => match self.read_entry::<T>(key).await {
                Some(entry) => {
                    warn!(key, error = %fetch_err, "Live fetch failed, serving cached value");
                    crate::metrics::record_swr_read("fallback");
                    Ok(entry.value)
                }
                None => Err(fetch_err.into()),
            },
        }
    }

    /// Read the cached entry without fetching. Absent is `None`, never an error.
    pub async fn peek<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read_entry::<T>(key).await.map(|e| e.value)
    }

    /// Write a page under its resource identity.
    ///
    /// The single-source-of-truth guard: unless the record's canonical URL
    /// equals the target key, the write is dropped with a warning. Cross-key
    /// writes corrupt unrelated cache entries and are never applied.
    pub async fn put_page(&self, key: &str, page: &TaggedPage) {
        if canonical_key(&page.url) != key {
            warn!(
                key,
                url = %page.url,
                "Dropping cache write: record identity does not match target key"
            );
            crate::metrics::record_guard_rejection();
            return;
        }
        self.persist(key, page).await;
    }

    /// Fire the background revalidation unless the same key triggered within
    /// the debounce window.
    fn trigger_revalidation<R, RFut, E>(&self, key: &str, revalidate: R)
    where
        R: FnOnce() -> RFut + Send + 'static,
        RFut: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display,
    {
        {
            let mut state = self.debounce.lock();
            let debounced = state.last_key.as_deref() == Some(key)
                && state
                    .last_at
                    .is_some_and(|at| at.elapsed() < self.debounce_window);
            if debounced {
                debug!(key, "Revalidation debounced");
                crate::metrics::record_revalidation("debounced");
                return;
            }
            state.last_key = Some(key.to_string());
            state.last_at = Some(Instant::now());
        }

        crate::metrics::record_revalidation("triggered");
        let key = key.to_string();
        // Detached: the caller already has data; errors go to the log only.
        tokio::spawn(async move {
            if let Err(e) = revalidate().await {
                warn!(key, error = %e, "Background revalidation failed");
                crate::metrics::record_revalidation("error");
            }
        });
    }
}
