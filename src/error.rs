//! Error types for BlockKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using BlockKvError
pub type Result<T> = std::result::Result<T, BlockKvError>;

/// Unified error type for BlockKV operations
#[derive(Debug, Error)]
pub enum BlockKvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    /// Any filesystem failure, including malformed or truncated metadata files.
    /// Never retried internally.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Storage is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BlockKvError {
    /// True for `KeyNotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlockKvError::KeyNotFound)
    }

    /// True for `Closed`
    pub fn is_closed(&self) -> bool {
        matches!(self, BlockKvError::Closed)
    }
}
