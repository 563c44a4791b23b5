//! Transparent compression for large cache payloads.
//!
//! Uses zstd with magic-bytes detection so reads can tell compressed
//! entries from raw JSON without any per-entry flag.
//!
//! # Feature Flag
//!
//! This module requires the `compression` feature (enabled by default):
//!
//! ```toml
//! [dependencies]
//! offline-sync = { version = "0.1", features = ["compression"] }
//! ```
//!
//! Compression failures are never surfaced to cache callers: the store
//! falls back to keeping the raw value and logs a warning.

#[cfg(feature = "compression")]
use serde_json::Value;

/// Zstd magic bytes (little-endian): 0xFD2FB528
#[cfg(feature = "compression")]
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Compression level 3 balances speed against ratio for JSON payloads.
#[cfg(feature = "compression")]
const COMPRESSION_LEVEL: i32 = 3;

/// Compression error types
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("compression failed: {0}")]
    CompressFailed(String),

    #[error("decompression failed: {0}")]
    DecompressFailed(String),

    #[error("JSON parse failed: {0}")]
    JsonParseFailed(#[from] serde_json::Error),
}

/// Check if data is zstd-compressed by checking magic bytes.
#[cfg(feature = "compression")]
#[inline]
#[must_use]
pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZSTD_MAGIC
}

/// Compress a JSON value to zstd bytes.
#[cfg(feature = "compression")]
pub fn compress(value: &Value) -> Result<Vec<u8>, CompressionError> {
    let json_bytes = serde_json::to_vec(value)?;
    zstd::encode_all(json_bytes.as_slice(), COMPRESSION_LEVEL)
        .map_err(|e| CompressionError::CompressFailed(e.to_string()))
}

/// Decompress bytes back to a JSON value.
///
/// Detects compression via magic bytes; plain JSON bytes are parsed
/// directly, so entries stored raw after a compression failure still
/// read back correctly.
#[cfg(feature = "compression")]
pub fn decompress(data: &[u8]) -> Result<Value, CompressionError> {
    if is_compressed(data) {
        let decompressed = zstd::decode_all(data)
            .map_err(|e| CompressionError::DecompressFailed(e.to_string()))?;
        serde_json::from_slice(&decompressed).map_err(CompressionError::from)
    } else {
        serde_json::from_slice(data).map_err(CompressionError::from)
    }
}

/// Check if data is compressed (always false without the feature).
#[cfg(not(feature = "compression"))]
#[inline]
#[must_use]
pub fn is_compressed(_data: &[u8]) -> bool {
    false
}
