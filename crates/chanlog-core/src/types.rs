//! Strong type definitions for chanlog.
//!
//! All identifiers are newtypes over a content hash so that an entry id can
//! never be passed where a version id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::identity_bytes;
use crate::hash::{decode_hex32, ObjectHash, OwnerId};

macro_rules! hash_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// View as the underlying object hash.
            pub const fn as_object(&self) -> ObjectHash {
                ObjectHash(self.0)
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                Ok(Self(decode_hex32(s)?))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl From<ObjectHash> for $name {
            fn from(hash: ObjectHash) -> Self {
                Self(hash.0)
            }
        }

        impl From<$name> for ObjectHash {
            fn from(id: $name) -> Self {
                ObjectHash(id.0)
            }
        }
    };
}

hash_newtype!(
    /// Content hash of an [`Entry`](crate::entry::Entry).
    ///
    /// Stable identity of one logged event; used for point lookups.
    EntryId
);

hash_newtype!(
    /// Content hash of a [`VersionNode`](crate::head::VersionNode): one version
    /// of a versioned object.
    VersionId
);

hash_newtype!(
    /// Hash of the identity of a versioned object (a channel or the registry).
    IdentityHash
);

/// The identity of a channel: `(channel_id, owner)`.
///
/// Ownerless channels sort before owned ones with the same id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelKey {
    /// Application-chosen channel name.
    pub channel_id: String,
    /// Owner of this writer chain, if any.
    pub owner: Option<OwnerId>,
}

impl ChannelKey {
    /// Create a channel key.
    pub fn new(channel_id: impl Into<String>, owner: Option<OwnerId>) -> Self {
        Self {
            channel_id: channel_id.into(),
            owner,
        }
    }

    /// Hash of the canonical identity object; keys the head's version history.
    pub fn identity_hash(&self) -> IdentityHash {
        IdentityHash(ObjectHash::hash(&identity_bytes(self)).0)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}@{}", self.channel_id, owner),
            None => write!(f, "{}", self.channel_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_id_hex_roundtrip() {
        let id = EntryId::from_bytes([0x42; 32]);
        let recovered = EntryId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_newtype_debug_names_type() {
        let id = VersionId::from_bytes([0xcd; 32]);
        assert!(format!("{:?}", id).starts_with("VersionId("));
        assert_eq!(format!("{}", id), "cdcdcdcdcdcdcdcd");
    }

    #[test]
    fn test_identity_hash_depends_on_owner() {
        let owner = OwnerId::from_bytes([1; 32]);
        let owned = ChannelKey::new("temps", Some(owner));
        let ownerless = ChannelKey::new("temps", None);
        assert_ne!(owned.identity_hash(), ownerless.identity_hash());
        assert_eq!(owned.identity_hash(), ChannelKey::new("temps", Some(owner)).identity_hash());
    }

    #[test]
    fn test_channel_key_ordering() {
        let a = ChannelKey::new("a", Some(OwnerId::from_bytes([9; 32])));
        let b = ChannelKey::new("a", None);
        let c = ChannelKey::new("b", None);
        let mut keys = vec![c.clone(), a.clone(), b.clone()];
        keys.sort();
        assert_eq!(keys, vec![b, a, c]);
    }
}
