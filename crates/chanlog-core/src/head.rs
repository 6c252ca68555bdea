//! Heads and the version DAG.
//!
//! A [`Head`] is the mutable pointer of one channel. It is never updated in
//! place: every append or merge writes a new [`VersionNode`] whose parents are
//! the versions it supersedes. Two writers that start from the same version
//! leave two leaves behind, which is a fork.

use serde::{Deserialize, Serialize};

use crate::canonical::{
    begin_object, decode_value, encode_bytes, encode_opt_hash, encode_text, encode_uint,
    hash_from_value, key, Fields, ObjectType,
};
use crate::error::{CoreError, Result};
use crate::hash::{ObjectHash, OwnerId};
use crate::types::{ChannelKey, EntryId, IdentityHash, VersionId};

/// The stored state of a channel pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Head {
    pub channel_id: String,
    pub owner: Option<OwnerId>,
    /// Newest entry of the chain, `None` for an empty channel.
    pub head_entry: Option<EntryId>,
}

impl Head {
    /// A head with no entries.
    pub fn empty(key: &ChannelKey) -> Self {
        Self {
            channel_id: key.channel_id.clone(),
            owner: key.owner,
            head_entry: None,
        }
    }

    /// A head pointing at `entry`.
    pub fn at(key: &ChannelKey, entry: EntryId) -> Self {
        Self {
            head_entry: Some(entry),
            ..Self::empty(key)
        }
    }

    /// The channel this head belongs to.
    pub fn key(&self) -> ChannelKey {
        ChannelKey::new(self.channel_id.clone(), self.owner)
    }

    /// Encode to canonical bytes.
    ///
    /// Format: `{0: 4, 1: channel_id, 2: owner | null, 3: head_entry | null}`
    pub fn to_canonical(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(80 + self.channel_id.len());
        begin_object(&mut buf, ObjectType::Head, 3);
        key(&mut buf, 1);
        encode_text(&mut buf, &self.channel_id);
        key(&mut buf, 2);
        encode_opt_hash(&mut buf, self.owner.as_ref().map(|o| o.as_bytes()));
        key(&mut buf, 3);
        encode_opt_hash(&mut buf, self.head_entry.as_ref().map(|e| e.as_bytes()));
        buf
    }

    /// Decode from canonical bytes.
    pub fn from_canonical(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        let fields = Fields::open(&value, ObjectType::Head)?;
        Ok(Self {
            channel_id: fields.text(1)?,
            owner: fields.opt_hash(2)?.map(OwnerId),
            head_entry: fields.opt_hash(3)?.map(EntryId),
        })
    }
}

/// A resolved version of a channel head.
///
/// This is what appends and merges return and what merges take as input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeadVersion {
    pub version: VersionId,
    pub key: ChannelKey,
    pub head_entry: Option<EntryId>,
}

impl HeadVersion {
    /// Pair a version id with the decoded head it stores.
    pub fn new(version: VersionId, head: Head) -> Self {
        Self {
            version,
            key: head.key(),
            head_entry: head.head_entry,
        }
    }
}

/// One node of the version DAG of a versioned object.
///
/// `parents` is kept sorted and deduplicated, so the id of a node does not
/// depend on the order in which its parents were named.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionNode {
    pub identity: IdentityHash,
    /// Hash of the immutable object holding this version's data.
    pub data: ObjectHash,
    pub parents: Vec<VersionId>,
}

impl VersionNode {
    /// Create a node, normalizing the parent list.
    pub fn new(identity: IdentityHash, data: ObjectHash, mut parents: Vec<VersionId>) -> Self {
        parents.sort();
        parents.dedup();
        Self {
            identity,
            data,
            parents,
        }
    }

    /// Encode to canonical bytes.
    ///
    /// Format: `{0: 5, 1: identity, 2: data, 3: [parent, ...]}`
    pub fn to_canonical(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(80 + 34 * self.parents.len());
        begin_object(&mut buf, ObjectType::VersionNode, 3);
        key(&mut buf, 1);
        encode_bytes(&mut buf, self.identity.as_bytes());
        key(&mut buf, 2);
        encode_bytes(&mut buf, self.data.as_bytes());
        key(&mut buf, 3);
        encode_uint(&mut buf, 4, self.parents.len() as u64);
        for parent in &self.parents {
            encode_bytes(&mut buf, parent.as_bytes());
        }
        buf
    }

    /// Decode from canonical bytes.
    pub fn from_canonical(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        let fields = Fields::open(&value, ObjectType::VersionNode)?;
        let parents = fields
            .array(3)?
            .iter()
            .map(|v| {
                hash_from_value(v)
                    .map(VersionId)
                    .ok_or_else(|| CoreError::MalformedObject("version parent is not a hash".into()))
            })
            .collect::<Result<Vec<_>>>()?;

        if parents.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::MalformedObject(
                "version parents not sorted".into(),
            ));
        }

        Ok(Self {
            identity: IdentityHash(fields.hash(1)?),
            data: ObjectHash(fields.hash(2)?),
            parents,
        })
    }

    /// Compute the version id (Blake3 hash of canonical bytes).
    pub fn compute_id(&self) -> VersionId {
        VersionId(ObjectHash::hash(&self.to_canonical()).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_roundtrip() {
        let key = ChannelKey::new("temps", Some(OwnerId::from_bytes([4; 32])));
        let empty = Head::empty(&key);
        let full = Head::at(&key, EntryId::from_bytes([5; 32]));

        assert_eq!(Head::from_canonical(&empty.to_canonical()).unwrap(), empty);
        assert_eq!(Head::from_canonical(&full.to_canonical()).unwrap(), full);
        assert_eq!(full.key(), key);
    }

    #[test]
    fn test_version_parent_order_irrelevant() {
        let identity = IdentityHash::from_bytes([1; 32]);
        let data = ObjectHash::from_bytes([2; 32]);
        let a = VersionId::from_bytes([3; 32]);
        let b = VersionId::from_bytes([4; 32]);

        let ab = VersionNode::new(identity, data, vec![a, b]);
        let ba = VersionNode::new(identity, data, vec![b, a, b]);
        assert_eq!(ab, ba);
        assert_eq!(ab.compute_id(), ba.compute_id());
    }

    #[test]
    fn test_version_roundtrip() {
        let node = VersionNode::new(
            IdentityHash::from_bytes([1; 32]),
            ObjectHash::from_bytes([2; 32]),
            vec![VersionId::from_bytes([9; 32]), VersionId::from_bytes([8; 32])],
        );
        let decoded = VersionNode::from_canonical(&node.to_canonical()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_root_version_has_empty_parent_array() {
        let node = VersionNode::new(IdentityHash::from_bytes([1; 32]), ObjectHash::ZERO, vec![]);
        let bytes = node.to_canonical();
        assert_eq!(*bytes.last().unwrap(), 0x80);
    }
}
