//! Error types for the store crate.

use thiserror::Error;

/// Top-level store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row with the given id.
    #[error("not found: {0}")]
    NotFound(String),

    /// The transactional insert-if-absent lost to an existing row with
    /// the same dedup key.
    #[error("duplicate dedup key: {key}")]
    Duplicate { key: String },

    /// A row with this id already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Internal error (lock poisoning, backend faults).
    #[error("internal store error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("lock poisoned: {e}"))
    }
}
