//! Error types for chanlog core.

use thiserror::Error;

use crate::canonical::ObjectType;

/// Core errors that can occur while encoding or decoding stored objects.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("malformed object: {0}")]
    MalformedObject(String),

    #[error("unexpected object type: expected {expected:?}, found {found:?}")]
    UnexpectedObjectType {
        expected: ObjectType,
        found: ObjectType,
    },

    #[error("payload type mismatch: expected {expected}, found {found}")]
    PayloadTypeMismatch { expected: String, found: String },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
