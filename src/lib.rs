//! # tagsync
//!
//! A local-first synchronization and caching engine for tags and tagged pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      UI / Query Layer                       │
//! │  • Cache-first reads via CacheController                   │
//! │  • Optimistic writes via TagService / PageService          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Stale-While-Revalidate Controller             │
//! │  • Fresh cache → immediate return + background refresh     │
//! │  • Canonical-URL guard on every cache write                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Repository Layer                        │
//! │  • Typed CRUD per collection (tags, pages)                 │
//! │  • In-process cache with hit/miss accounting               │
//! │  • Tombstones instead of hard deletes                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//! ┌─────────────────────────┐   ┌─────────────────────────────┐
//! │   Local Store Adapter   │   │        Sync Engine          │
//! │  • Namespaced JSON KV   │◄──│  Idle→Pull→Merge→Push→Idle  │
//! │  • Change notifications │   │  • LWW merge, remote ties   │
//! └─────────────────────────┘   │  • Per-collection watermark │
//!                               └─────────────────────────────┘
//!                                              │
//!                                              ▼
//!                                  Remote store (owner-scoped
//!                                  filtered select + upsert)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tagsync::{
//!     CacheController, InMemoryRemote, MemoryStore, Repository, StoreAdapter,
//!     SyncConfig, SyncEngine, Tag, TaggedPage,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SyncConfig::default();
//!     let adapter = StoreAdapter::new(Arc::new(MemoryStore::default()), &config.namespace);
//!     let remote = Arc::new(InMemoryRemote::new());
//!
//!     let tags = Arc::new(Repository::<Tag>::new(adapter.clone()));
//!     let pages = Arc::new(Repository::<TaggedPage>::new(adapter.clone()));
//!
//!     let engine = SyncEngine::new(
//!         config.clone(),
//!         "owner-1",
//!         remote,
//!         tags.clone(),
//!         pages.clone(),
//!         adapter.clone(),
//!     );
//!
//!     // Optimistic local write; the next cycle pushes it.
//!     tags.upsert(Tag::new("reading")).await.expect("local write");
//!     engine.sync_cycle().await.expect("sync");
//!
//!     let _cache = CacheController::new(adapter, &config);
//! }
//! ```
//!
//! ## Consistency model
//!
//! Single-process, cooperative. Conflicts resolve last-writer-wins on
//! `updated_at` with the remote record winning ties; deletions propagate as
//! tombstones and are never hard-deleted by sync. A failed cycle changes
//! nothing locally and is retried wholesale from the same watermark.
//!
//! ## Modules
//!
//! - [`engine`]: pull/merge/push orchestration and watermarks
//! - [`swr`]: stale-while-revalidate read path for the UI layer
//! - [`repo`]: typed repositories with cache hit/miss accounting
//! - [`monitor`]: aggregated cache statistics
//! - [`store`]: local key-value storage boundary and adapter
//! - [`remote`]: remote store boundary
//! - [`query`]: incremental pull-query construction
//! - [`url_norm`]: canonical URL keys for resource identity
//! - [`service`]: tag binding and page mutation services

pub mod config;
pub mod engine;
pub mod metrics;
pub mod model;
pub mod monitor;
pub mod query;
pub mod remote;
pub mod repo;
pub mod service;
pub mod store;
pub mod swr;
pub mod url_norm;

pub use config::SyncConfig;
pub use engine::{CycleSummary, KindSummary, SyncEngine, SyncError, SyncState};
pub use model::{EntityKind, Record, Tag, TaggedPage};
pub use monitor::{CacheMonitor, MonitorTotals};
pub use query::{Filter, FilterOp, PullQuery};
pub use remote::{InMemoryRemote, RemoteError, RemoteStore};
pub use repo::{CacheSource, CacheStats, Repository};
pub use service::{PageService, ServiceError, TagService};
pub use store::{LocalStore, MemoryStore, StoreAdapter, StoreChange, StoreError};
pub use swr::{CacheController, CacheError, CachedEntry};
pub use url_norm::{canonical_key, same_resource};
