// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded, TTL-based cache with hybrid eviction and transparent compression.
//!
//! The [`CacheStore`] is the read-side of the engine: query results land
//! here with an expiry, and the [`crate::coordinator::OptimisticCoordinator`]
//! mutates entries in place before the corresponding write is delivered.
//!
//! Every operation is synchronous and non-throwing from the caller's point
//! of view; internal errors degrade (raw storage, logged warnings) rather
//! than propagate. The one exception is [`CacheStore::get_or_set`], whose
//! producer failure legitimately belongs to the caller.
//!
//! # Eviction
//!
//! When the store is at capacity, the entry with the lowest
//! `hit_count + seconds_since_creation` score is evicted. This is a hybrid
//! of least-frequently-used and age, not a strict LRU: each hit is worth
//! one second of survival.

pub mod compression;

use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::SyncConfig;

/// Eviction score: lower scores are evicted first.
#[inline]
fn eviction_score(hit_count: u64, age: Duration) -> f64 {
    hit_count as f64 + age.as_secs_f64()
}

/// How a payload is held in memory.
#[derive(Debug, Clone)]
enum StoredPayload {
    Plain(Value),
    #[cfg(feature = "compression")]
    Compressed(Vec<u8>),
}

impl StoredPayload {
    fn decode(&self) -> Result<Value, compression::CompressionError> {
        match self {
            Self::Plain(value) => Ok(value.clone()),
            #[cfg(feature = "compression")]
            Self::Compressed(bytes) => compression::decompress(bytes),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: StoredPayload,
    created_at: Instant,
    ttl: Duration,
    hit_count: u64,
}

impl CacheEntry {
    fn new(payload: StoredPayload, ttl: Duration) -> Self {
        Self {
            payload,
            created_at: Instant::now(),
            ttl,
            hit_count: 0,
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Hits over total lookups (0.0 when no lookups yet).
    pub hit_rate: f64,
}

/// Bounded key/value store with TTL expiry and hybrid eviction.
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
    default_ttl: Duration,
    #[cfg_attr(not(feature = "compression"), allow(dead_code))]
    compression_threshold: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStore {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: config.cache_max_entries,
            default_ttl: config.cache_ttl(),
            compression_threshold: config.compression_threshold_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Insert or replace an entry. Never fails: serialization or compression
    /// problems degrade to storing the raw value with a logged warning.
    ///
    /// `ttl` of `None` uses the configured default.
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let payload = self.encode(key, value);

        if self.max_entries > 0
            && !self.entries.contains_key(key)
            && self.entries.len() >= self.max_entries
        {
            self.evict_one();
        }

        self.entries.insert(key.to_string(), CacheEntry::new(payload, ttl));
        crate::metrics::set_cache_entries(self.entries.len());
    }

    /// Look up a key. Returns `None` if missing or expired; an expired
    /// entry is deleted on the way out. A hit bumps the entry's hit count
    /// and the global hit counter; a miss bumps the miss counter.
    pub fn get(&self, key: &str) -> Option<Value> {
        let stale = match self.entries.get_mut(key) {
            None => false,
            Some(mut entry) => {
                if entry.is_expired() {
                    true
                } else {
                    entry.hit_count = entry.hit_count.saturating_add(1);
                    match entry.payload.decode() {
                        Ok(value) => {
                            self.hits.fetch_add(1, Ordering::Relaxed);
                            crate::metrics::record_cache_lookup("hit");
                            return Some(value);
                        }
                        Err(e) => {
                            warn!(key, error = %e, "cache payload unreadable, dropping entry");
                            true
                        }
                    }
                }
            }
        };

        if stale {
            self.entries.remove(key);
            crate::metrics::set_cache_entries(self.entries.len());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_cache_lookup("miss");
        None
    }

    /// Expiry-aware existence check. Does not touch hit/miss counters.
    pub fn has(&self, key: &str) -> bool {
        let expired = match self.entries.get(key) {
            None => return false,
            Some(entry) => entry.is_expired(),
        };
        if expired {
            self.entries.remove(key);
            return false;
        }
        true
    }

    /// Explicitly invalidate one key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            crate::metrics::set_cache_entries(self.entries.len());
        }
        removed
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.clear();
        crate::metrics::set_cache_entries(0);
    }

    /// Delete all keys matching the pattern. Used for cache busting after a
    /// write to a resource family (e.g. `^products:`). Returns the number
    /// of entries removed.
    pub fn invalidate_by_pattern(&self, pattern: &Regex) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| pattern.is_match(e.key()))
            .map(|e| e.key().clone())
            .collect();

        for key in &keys {
            self.entries.remove(key);
        }
        if !keys.is_empty() {
            debug!(pattern = %pattern, count = keys.len(), "invalidated cache entries");
            crate::metrics::set_cache_entries(self.entries.len());
        }
        keys.len()
    }

    /// Return the cached value, or run `producer` once, cache its result,
    /// and return it. Producer failures propagate to the caller and nothing
    /// is cached.
    ///
    /// There is no single-flight guard: concurrent callers for the same
    /// uncached key may each invoke their producer, with the last write
    /// winning. Callers converge on the same cached value afterwards.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = producer().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Remove expired entries nobody is reading. Lazy deletion in [`get`]
    /// already keeps results correct; this merely bounds the memory of
    /// entries that are never looked up again. Returns the number removed.
    ///
    /// [`get`]: Self::get
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
            crate::metrics::set_cache_entries(self.entries.len());
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            entries: self.entries.len(),
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
        }
    }

    /// Evict the entry with the lowest `hit_count + age_secs` score.
    fn evict_one(&self) {
        let victim = self
            .entries
            .iter()
            .map(|e| {
                let score = eviction_score(e.hit_count, e.created_at.elapsed());
                (e.key().clone(), score)
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((key, score)) = victim {
            debug!(key = %key, score, "evicting cache entry");
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_eviction();
        }
    }

    #[cfg(feature = "compression")]
    fn encode(&self, key: &str, value: Value) -> StoredPayload {
        match serde_json::to_vec(&value) {
            Ok(bytes) if bytes.len() > self.compression_threshold => {
                match compression::compress(&value) {
                    Ok(compressed) => StoredPayload::Compressed(compressed),
                    Err(e) => {
                        warn!(key, error = %e, "compression failed, storing raw value");
                        StoredPayload::Plain(value)
                    }
                }
            }
            Ok(_) => StoredPayload::Plain(value),
            Err(e) => {
                warn!(key, error = %e, "payload serialization failed, storing raw value");
                StoredPayload::Plain(value)
            }
        }
    }

    #[cfg(not(feature = "compression"))]
    fn encode(&self, _key: &str, value: Value) -> StoredPayload {
        StoredPayload::Plain(value)
    }
}
