//! Cache monitor: aggregates per-repository hit/miss statistics.
//!
//! An explicitly constructed, injected instance (no module-level singleton);
//! purely observational, no effect on correctness.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::repo::{CacheSource, CacheStats};

/// Aggregated statistics across all registered repositories.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorTotals {
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_requests: u64,
    /// `0.0` when no requests have occurred.
    pub overall_hit_rate: f64,
}

pub struct CacheMonitor {
    sources: RwLock<Vec<(String, Arc<dyn CacheSource>)>>,
}

impl CacheMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
        }
    }

    /// Register a repository under a display name.
    pub fn register(&self, name: impl Into<String>, source: Arc<dyn CacheSource>) {
        self.sources.write().push((name.into(), source));
    }

    /// Per-source snapshot, in registration order.
    #[must_use]
    pub fn per_source(&self) -> Vec<(String, CacheStats)> {
        self.sources
            .read()
            .iter()
            .map(|(name, src)| (name.clone(), src.cache_stats()))
            .collect()
    }

    /// Aggregate totals across all registered sources.
    #[must_use]
    pub fn totals(&self) -> MonitorTotals {
        let mut total_hits = 0u64;
        let mut total_misses = 0u64;
        for (_, src) in self.sources.read().iter() {
            let stats = src.cache_stats();
            total_hits += stats.hits;
            total_misses += stats.misses;
        }
        let total_requests = total_hits + total_misses;
        let totals = MonitorTotals {
            total_hits,
            total_misses,
            total_requests,
            overall_hit_rate: if total_requests > 0 {
                total_hits as f64 / total_requests as f64
            } else {
                0.0
            },
        };
        crate::metrics::set_overall_hit_rate(totals.overall_hit_rate);
        totals
    }

    /// Reset counters on every registered source.
    pub fn reset_all_stats(&self) {
        for (_, src) in self.sources.read().iter() {
            src.reset_cache_stats();
        }
    }
}

impl Default for CacheMonitor {
    fn default() -> Self {
        Self::new()
    }
}
