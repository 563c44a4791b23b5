//! Configuration for the offline sync engine.
//!
//! # Example
//!
//! ```
//! use offline_sync::SyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.max_retries, 3);
//!
//! // Full config
//! let config = SyncConfig {
//!     cache_max_entries: 200,
//!     drain_batch_size: 25,
//!     drain_interval_ms: 15_000,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the offline sync engine.
///
/// All fields have sensible defaults for an interactive client talking to
/// a remote record store over a flaky connection.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Max entries in the cache before eviction kicks in (default: 500)
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Default cache entry TTL in milliseconds (default: 5 minutes)
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Payloads whose serialized size exceeds this are stored compressed
    /// (default: 10 KB)
    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,

    /// Failed delivery attempts before an operation is dropped as a
    /// permanent failure (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Max operations dispatched per drain pass (default: 10)
    #[serde(default = "default_drain_batch_size")]
    pub drain_batch_size: usize,

    /// Scheduler drain interval in milliseconds (default: 30 seconds)
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,

    /// Per-operation gateway timeout in milliseconds (default: 10 seconds).
    /// A timeout counts as a transient delivery failure.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,

    /// Initial backoff after a drain pass where every attempt failed
    /// (default: 1 second)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Backoff cap (default: 60 seconds)
    #[serde(default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,

    /// Backoff multiplier (default: 2.0)
    #[serde(default = "default_retry_backoff_factor")]
    pub retry_backoff_factor: f64,
}

fn default_cache_max_entries() -> usize { 500 }
fn default_cache_ttl_ms() -> u64 { 5 * 60 * 1000 }
fn default_compression_threshold_bytes() -> usize { 10 * 1024 }
fn default_max_retries() -> u32 { 3 }
fn default_drain_batch_size() -> usize { 10 }
fn default_drain_interval_ms() -> u64 { 30_000 }
fn default_op_timeout_ms() -> u64 { 10_000 }
fn default_retry_backoff_ms() -> u64 { 1_000 }
fn default_retry_backoff_max_ms() -> u64 { 60_000 }
fn default_retry_backoff_factor() -> f64 { 2.0 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_max_entries: default_cache_max_entries(),
            cache_ttl_ms: default_cache_ttl_ms(),
            compression_threshold_bytes: default_compression_threshold_bytes(),
            max_retries: default_max_retries(),
            drain_batch_size: default_drain_batch_size(),
            drain_interval_ms: default_drain_interval_ms(),
            op_timeout_ms: default_op_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_backoff_max_ms: default_retry_backoff_max_ms(),
            retry_backoff_factor: default_retry_backoff_factor(),
        }
    }
}

impl SyncConfig {
    /// Default cache TTL as a [`Duration`].
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Per-operation gateway timeout as a [`Duration`].
    #[must_use]
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Scheduler drain interval as a [`Duration`].
    #[must_use]
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.cache_max_entries, 500);
        assert_eq!(config.cache_ttl_ms, 300_000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.drain_batch_size, 10);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SyncConfig = serde_json::from_str(r#"{"max_retries": 5}"#).unwrap();
        assert_eq!(config.max_retries, 5);
        // Everything else falls back to defaults
        assert_eq!(config.drain_interval_ms, 30_000);
    }

    #[test]
    fn test_duration_helpers() {
        let config = SyncConfig { op_timeout_ms: 250, ..Default::default() };
        assert_eq!(config.op_timeout(), Duration::from_millis(250));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    }
}
