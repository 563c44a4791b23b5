// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the offline sync engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding host is responsible for choosing the exporter
//! (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `offline_sync_` prefix for all metrics
//! - `_total` suffix for counters
//!
//! # Labels
//! - `status`: hit, miss (cache lookups)
//! - `outcome`: completed, retried, failed (drain results)

use metrics::{counter, gauge};

/// Record a cache lookup with its outcome ("hit" or "miss")
pub fn record_cache_lookup(status: &str) {
    counter!(
        "offline_sync_cache_lookups_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a cache eviction
pub fn record_eviction() {
    counter!("offline_sync_cache_evictions_total").increment(1);
}

/// Set current cache entry count
pub fn set_cache_entries(count: usize) {
    gauge!("offline_sync_cache_entries").set(count as f64);
}

/// Set current queue depth (operations awaiting delivery)
pub fn set_queue_depth(count: usize) {
    gauge!("offline_sync_queue_depth").set(count as f64);
}

/// Record an operation entering the queue
pub fn record_enqueue() {
    counter!("offline_sync_enqueued_total").increment(1);
}

/// Record a delivery retry
pub fn record_retry() {
    counter!("offline_sync_retries_total").increment(1);
}

/// Record the settled outcomes of one drain pass
pub fn record_drain(completed: usize, retried: usize, failed: usize) {
    counter!("offline_sync_drains_total").increment(1);
    counter!(
        "offline_sync_drain_operations_total",
        "outcome" => "completed"
    )
    .increment(completed as u64);
    counter!(
        "offline_sync_drain_operations_total",
        "outcome" => "retried"
    )
    .increment(retried as u64);
    counter!(
        "offline_sync_drain_operations_total",
        "outcome" => "failed"
    )
    .increment(failed as u64);
}
