//! Error types for channel operations.

use chanlog_core::{ChannelKey, CoreError, EntryId, ObjectHash, VersionId};
use chanlog_store::StoreError;
use thiserror::Error;

/// Errors that can occur during channel operations.
///
/// Variants fall into three groups: caller misuse (an unknown version, or
/// versions of different channels), lookups that found nothing, and errors
/// from the store or from decoding stored objects, which are passed through
/// unchanged.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Encoding or decoding error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The version does not exist or is not a channel head.
    #[error("unknown version: {0}")]
    UnknownVersion(VersionId),

    /// Two versions that were expected to belong to one channel do not.
    #[error("versions belong to different channels: {left} and {right}")]
    MismatchedChannels { left: ChannelKey, right: ChannelKey },

    /// No entry with this id matches the lookup.
    #[error("object not found: {0}")]
    ObjectNotFound(EntryId),

    /// The channel has no head versions.
    #[error("channel not found: {0}")]
    ChannelNotFound(ChannelKey),

    /// A stored object references an object the store does not have.
    #[error("missing object {0} referenced from a chain")]
    MissingObject(ObjectHash),
}

impl ChannelError {
    /// Whether this error indicates a caller bug. Such errors are never
    /// worth retrying.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            ChannelError::UnknownVersion(_) | ChannelError::MismatchedChannels { .. }
        )
    }

    /// Whether this error reports that a lookup matched nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ChannelError::ObjectNotFound(_) | ChannelError::ChannelNotFound(_)
        )
    }
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let misuse = ChannelError::MismatchedChannels {
            left: ChannelKey::new("a", None),
            right: ChannelKey::new("b", None),
        };
        assert!(misuse.is_misuse());
        assert!(!misuse.is_not_found());

        let missing = ChannelError::ObjectNotFound(EntryId::from_bytes([0; 32]));
        assert!(missing.is_not_found());
        assert!(!missing.is_misuse());

        let store = ChannelError::from(StoreError::Lock("poisoned".into()));
        assert!(!store.is_misuse());
        assert!(!store.is_not_found());
    }
}
