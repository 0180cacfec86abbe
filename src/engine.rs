// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync engine: push/pull orchestration between the local repositories and
//! the remote store.
//!
//! Each cycle walks the state machine
//!
//! ```text
//! Idle → Pulling → Merging → Pushing → Idle
//!   └────────────→ Failed ←───────────┘
//! ```
//!
//! and is all-or-nothing per stage: any stage error aborts the cycle, leaves
//! the watermarks untouched, and the next trigger retries the same window
//! wholesale. Both collections are merged in memory before either is written,
//! and the watermarks commit only after both merge writes land, so an
//! interrupted cycle is always safe to re-run. Conflicts resolve
//! last-writer-wins on `updated_at`, with
//! the remote record winning ties (the pull already reflects a server-ordered
//! state). A newer remote tombstone overwrites a live local record, which is
//! how deletions propagate without zombies.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::model::{EntityKind, Record, Tag, TaggedPage};
use crate::query::{PullQuery, OWNER_COLUMN};
use crate::remote::{RemoteError, RemoteStore};
use crate::repo::Repository;
use crate::store::{StoreAdapter, StoreError};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to serialize {collection} record '{id}' for push: {source}")]
    Encode {
        collection: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Sync-cycle state, broadcast through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Pulling,
    Merging,
    Pushing,
    /// Last cycle failed; watermarks unchanged, next cycle retries.
    Failed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Pulling => write!(f, "Pulling"),
            Self::Merging => write!(f, "Merging"),
            Self::Pushing => write!(f, "Pushing"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Per-collection outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindSummary {
    pub pulled: usize,
    pub merged: usize,
    pub pushed: usize,
    pub watermark: i64,
}

/// Outcome of one full sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub tags: KindSummary,
    pub pages: KindSummary,
}

/// Rows fetched during the pull stage, held until merge.
struct Staged {
    rows: Vec<Value>,
    since: i64,
}

/// One collection's merge, computed but not yet written.
struct MergePlan<T> {
    map: BTreeMap<String, T>,
    remote_seen: HashMap<String, i64>,
    pulled: usize,
    merged: usize,
    since: i64,
    max_seen: i64,
}

pub struct SyncEngine {
    config: SyncConfig,
    owner_id: String,
    remote: Arc<dyn RemoteStore>,
    tags: Arc<Repository<Tag>>,
    pages: Arc<Repository<TaggedPage>>,
    /// Watermark / pushed-mark persistence, sharing the repositories' namespace.
    marks: StoreAdapter,
    state: watch::Sender<SyncState>,
    state_rx: watch::Receiver<SyncState>,
    /// One cycle at a time; an overlapping trigger waits its turn.
    cycle_lock: tokio::sync::Mutex<()>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        config: SyncConfig,
        owner_id: impl Into<String>,
        remote: Arc<dyn RemoteStore>,
        tags: Arc<Repository<Tag>>,
        pages: Arc<Repository<TaggedPage>>,
        marks: StoreAdapter,
    ) -> Self {
        let (state, state_rx) = watch::channel(SyncState::Idle);
        Self {
            config,
            owner_id: owner_id.into(),
            remote,
            tags,
            pages,
            marks,
            state,
            state_rx,
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current sync state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SyncState> {
        self.state_rx.clone()
    }

    fn watermark_key(kind: EntityKind) -> String {
        format!("watermark:{kind}")
    }

    fn pushed_key(kind: EntityKind) -> String {
        format!("pushed:{kind}")
    }

    fn seen_key(kind: EntityKind) -> String {
        format!("seen:{kind}")
    }

    /// Last successfully merged watermark for a collection (0 = never pulled).
    pub async fn watermark(&self, kind: EntityKind) -> i64 {
        self.marks
            .get(&Self::watermark_key(kind))
            .await
            .unwrap_or_default()
            .unwrap_or(0)
    }

    async fn pushed_mark(&self, kind: EntityKind) -> i64 {
        self.marks
            .get(&Self::pushed_key(kind))
            .await
            .unwrap_or_default()
            .unwrap_or(0)
    }

    /// Versions of pulled rows still sitting above the pushed mark. Pushing
    /// them back would only echo the remote's own state.
    async fn seen_versions(&self, kind: EntityKind) -> BTreeMap<String, i64> {
        self.marks
            .get(&Self::seen_key(kind))
            .await
            .unwrap_or_default()
            .unwrap_or_default()
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        let limit = Duration::from_millis(self.config.remote_timeout_ms);
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(limit)),
        }
    }

    /// Run one full sync cycle: pull, merge, push, for both collections.
    ///
    /// Returns the per-collection summary, or the first stage error. A failed
    /// cycle leaves local data and marks as they were.
    #[tracing::instrument(skip(self), fields(owner = %self.owner_id))]
    pub async fn sync_cycle(&self) -> Result<CycleSummary, SyncError> {
        let _guard = self.cycle_lock.lock().await;
        let cycle_start = std::time::Instant::now();

        let result = self.run_stages().await;
        match &result {
            Ok(summary) => {
                let _ = self.state.send(SyncState::Idle);
                crate::metrics::record_sync_cycle("success", cycle_start.elapsed());
                info!(
                    tags_merged = summary.tags.merged,
                    pages_merged = summary.pages.merged,
                    tags_pushed = summary.tags.pushed,
                    pages_pushed = summary.pages.pushed,
                    "Sync cycle complete"
                );
            }
            Err(e) => {
                let _ = self.state.send(SyncState::Failed);
                crate::metrics::record_sync_cycle("error", cycle_start.elapsed());
                warn!(error = %e, "Sync cycle failed; will retry from the same watermark");
                let _ = self.state.send(SyncState::Idle);
            }
        }
        result
    }

    async fn run_stages(&self) -> Result<CycleSummary, SyncError> {
        // Pull: fetch both collections before touching local state.
        let _ = self.state.send(SyncState::Pulling);
        let (tag_staged, page_staged) = {
            let _timer = crate::metrics::LatencyTimer::new("pull");
            let tags = self.fetch_stage(EntityKind::Tags).await?;
            let pages = self.fetch_stage(EntityKind::Pages).await?;
            crate::metrics::record_sync_stage("pull", "success");
            (tags, pages)
        };

        // Merge: stage both collections in memory, then write both, then
        // commit the watermarks. A failure anywhere in between commits no
        // watermark, so the next cycle retries the same window wholesale.
        let _ = self.state.send(SyncState::Merging);
        let (tag_plan, page_plan) = {
            let _timer = crate::metrics::LatencyTimer::new("merge");
            let tag_plan = Self::plan_merge(self.tags.all_map().await, &tag_staged);
            let page_plan = Self::plan_merge(self.pages.all_map().await, &page_staged);

            if tag_plan.merged > 0 {
                self.tags.replace_all(&tag_plan.map).await?;
            }
            if page_plan.merged > 0 {
                self.pages.replace_all(&page_plan.map).await?;
            }
            self.commit_watermark(&tag_plan).await?;
            self.commit_watermark(&page_plan).await?;
            crate::metrics::record_sync_stage("merge", "success");
            (tag_plan, page_plan)
        };

        // Push: local changes newer than the pushed mark.
        let _ = self.state.send(SyncState::Pushing);
        let (tags_pushed, pages_pushed) = {
            let _timer = crate::metrics::LatencyTimer::new("push");
            let t = self.push_stage(&self.tags, &tag_plan.remote_seen).await?;
            let p = self.push_stage(&self.pages, &page_plan.remote_seen).await?;
            crate::metrics::record_sync_stage("push", "success");
            (t, p)
        };

        Ok(CycleSummary {
            tags: KindSummary {
                pulled: tag_plan.pulled,
                merged: tag_plan.merged,
                pushed: tags_pushed,
                watermark: tag_plan.max_seen,
            },
            pages: KindSummary {
                pulled: page_plan.pulled,
                merged: page_plan.merged,
                pushed: pages_pushed,
                watermark: page_plan.max_seen,
            },
        })
    }

    async fn fetch_stage(&self, kind: EntityKind) -> Result<Staged, SyncError> {
        let since = self.watermark(kind).await;
        let query = PullQuery::incremental(kind.table(), &self.owner_id, since);
        let rows = self.bounded(self.remote.select(&query)).await?;
        debug!(collection = %kind, since, pulled = rows.len(), "Pulled remote rows");
        Ok(Staged { rows, since })
    }

    /// Merge pulled rows into a copy of the local collection, last-writer-wins.
    ///
    /// Pure staging, nothing is written here. The plan carries the merged map,
    /// the watermark candidate, and the id → `updated_at` view of the pulled
    /// rows the push stage uses to avoid echoing remote records straight back.
    fn plan_merge<T: Record>(mut map: BTreeMap<String, T>, staged: &Staged) -> MergePlan<T> {
        let kind = T::KIND;
        let mut remote_seen: HashMap<String, i64> = HashMap::new();
        let mut max_seen = staged.since;
        let mut merged = 0usize;

        for row in &staged.rows {
            let remote: T = match serde_json::from_value(row.clone()) {
                Ok(record) => record,
                Err(e) => {
                    // A malformed row is not transient; retrying the cycle
                    // would not fix it. Skip it and keep the rest.
                    warn!(collection = %kind, error = %e, "Skipping undecodable remote row");
                    continue;
                }
            };
            max_seen = max_seen.max(remote.updated_at());
            remote_seen.insert(remote.id().to_string(), remote.updated_at());

            match map.get(remote.id()) {
                // Remote wins on strictly-newer and on ties.
                Some(local) if local.updated_at() > remote.updated_at() => {}
                _ => {
                    map.insert(remote.id().to_string(), remote);
                    merged += 1;
                }
            }
        }

        MergePlan {
            map,
            remote_seen,
            pulled: staged.rows.len(),
            merged,
            since: staged.since,
            max_seen,
        }
    }

    /// Advance one collection's watermark after its merge write landed.
    /// The watermark never regresses.
    async fn commit_watermark<T: Record>(&self, plan: &MergePlan<T>) -> Result<(), SyncError> {
        let kind = T::KIND;
        if plan.max_seen > plan.since {
            self.marks
                .set(&Self::watermark_key(kind), &plan.max_seen)
                .await?;
        }
        crate::metrics::record_merged(kind.table(), plan.merged);
        crate::metrics::set_watermark(kind.table(), plan.max_seen);
        Ok(())
    }

    /// Upsert local records newer than the pushed mark to the remote store.
    ///
    /// Pulled rows are suppressed by id through the persisted seen-version
    /// map; they are the remote's own state. The mark advances only past
    /// records this device actually pushed, so a remote row with a
    /// skewed-ahead clock never withholds local changes.
    async fn push_stage<T: Record>(
        &self,
        repo: &Repository<T>,
        remote_seen: &HashMap<String, i64>,
    ) -> Result<usize, SyncError> {
        let kind = T::KIND;
        let since = self.pushed_mark(kind).await;
        let mut seen = self.seen_versions(kind).await;
        for (id, version) in remote_seen {
            seen.insert(id.clone(), *version);
        }
        let map = repo.all_map().await;

        let candidates: Vec<&T> = map
            .values()
            .filter(|r| r.updated_at() > since)
            .filter(|r| seen.get(r.id()) != Some(&r.updated_at()))
            .collect();

        let mut high = since;
        let mut pushed = 0usize;
        if !candidates.is_empty() {
            let mut rows = Vec::with_capacity(candidates.len());
            for record in &candidates {
                let mut row = serde_json::to_value(record).map_err(|source| SyncError::Encode {
                    collection: kind.table(),
                    id: record.id().to_string(),
                    source,
                })?;
                if let Value::Object(ref mut obj) = row {
                    obj.insert(OWNER_COLUMN.to_string(), Value::String(self.owner_id.clone()));
                }
                rows.push(row);
                high = high.max(record.updated_at());
            }

            self.bounded(self.remote.upsert(kind.table(), &rows)).await?;
            pushed = rows.len();
            crate::metrics::record_pushed(kind.table(), pushed);
            debug!(collection = %kind, pushed, mark = high, "Pushed local changes");
        }

        if high > since {
            self.marks.set(&Self::pushed_key(kind), &high).await?;
        }
        if !remote_seen.is_empty() || high > since {
            // Entries at or below the mark are already covered by it.
            seen.retain(|_, version| *version > high);
            self.marks.set(&Self::seen_key(kind), &seen).await?;
        }
        Ok(pushed)
    }

    /// Run sync cycles on the configured interval until `shutdown` flips true.
    ///
    /// Cycle errors are logged and absorbed; the next tick retries from the
    /// same watermark. The caller never joins on individual cycles.
    pub fn spawn_periodic(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(engine.config.sync_interval_ms));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = engine.sync_cycle().await {
                            warn!(error = %e, "Background sync cycle failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Background sync stopped");
                            return;
                        }
                    }
                }
            }
        })
    }
}
