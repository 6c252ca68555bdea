//! Error types for the store module.

use chanlog_core::{CoreError, IdentityHash, VersionId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored bytes could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Object not found.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A version was named as a parent but is not a version of that identity.
    #[error("unknown version {version} for identity {identity}")]
    UnknownVersion {
        version: VersionId,
        identity: IdentityHash,
    },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Lock(String),

    /// A blocking background task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
