// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation.
//!
//! Uses the `metrics` crate for backend-agnostic collection; the host chooses
//! the exporter.
//!
//! # Metric Naming Convention
//! - `tagsync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `collection`: tags, pages
//! - `stage`: pull, merge, push
//! - `status`: success, error

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a repository read, hit or miss.
pub fn record_repo_read(collection: &str, hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!(
        "tagsync_repo_reads_total",
        "collection" => collection.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a sync stage outcome.
pub fn record_sync_stage(stage: &str, status: &str) {
    counter!(
        "tagsync_sync_stage_total",
        "stage" => stage.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a full sync cycle outcome and duration.
pub fn record_sync_cycle(status: &str, duration: Duration) {
    counter!(
        "tagsync_sync_cycles_total",
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("tagsync_sync_cycle_seconds").record(duration.as_secs_f64());
}

/// Record merged record count for one pull.
pub fn record_merged(collection: &str, count: usize) {
    counter!(
        "tagsync_records_merged_total",
        "collection" => collection.to_string()
    )
    .increment(count as u64);
}

/// Record pushed record count.
pub fn record_pushed(collection: &str, count: usize) {
    counter!(
        "tagsync_records_pushed_total",
        "collection" => collection.to_string()
    )
    .increment(count as u64);
}

/// Set the per-collection pull watermark gauge.
pub fn set_watermark(collection: &str, watermark: i64) {
    gauge!(
        "tagsync_watermark",
        "collection" => collection.to_string()
    )
    .set(watermark as f64);
}

/// Record a cache-controller read outcome (fresh, stale, fetched, fallback).
pub fn record_swr_read(outcome: &str) {
    counter!(
        "tagsync_swr_reads_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a background revalidation trigger or its suppression.
pub fn record_revalidation(outcome: &str) {
    counter!(
        "tagsync_revalidations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a cache write rejected by the canonical-key guard.
pub fn record_guard_rejection() {
    counter!("tagsync_cache_guard_rejections_total").increment(1);
}

/// Set the aggregated repository hit rate.
pub fn set_overall_hit_rate(rate: f64) {
    gauge!("tagsync_repo_hit_rate").set(rate);
}

/// A timing guard that records latency on drop.
pub struct LatencyTimer {
    stage: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer for a sync stage.
    #[must_use]
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(
            "tagsync_stage_seconds",
            "stage" => self.stage
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}
