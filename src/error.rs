//! Error types for shardkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for shardkv operations.
///
/// `NotFound` is deliberately absent: a missing key is signalled out of band
/// from `Get`'s return value, never as an `Err`.
#[derive(Debug, Error)]
pub enum Error {
    // -------------------------------------------------------------------------
    // I/O errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Corruption
    // -------------------------------------------------------------------------
    /// A malformed on-disk record outside the tolerated truncated-tail case
    /// (bad SSTable magic, footer CRC mismatch, ...).
    #[error("corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Argument errors
    // -------------------------------------------------------------------------
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Batcher errors
    // -------------------------------------------------------------------------
    #[error("batcher stopped accepting writes: {0}")]
    BatcherStopped(String),

    // -------------------------------------------------------------------------
    // Lifecycle errors
    // -------------------------------------------------------------------------
    #[error("database is closed")]
    Closed,
}
