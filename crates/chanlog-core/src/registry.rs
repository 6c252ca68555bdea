//! The channel registry snapshot.
//!
//! The registry is a grow-only set of channel keys kept as a versioned object.
//! Concurrent registrations fork it like any other versioned object; readers
//! union every leaf, so a fork never hides a member.

use ciborium::value::Value;
use std::collections::BTreeSet;

use crate::canonical::{
    begin_object, decode_value, encode_opt_hash, encode_text, encode_uint, hash_from_value, key,
    Fields, ObjectType,
};
use crate::error::{CoreError, Result};
use crate::hash::{ObjectHash, OwnerId};
use crate::types::{ChannelKey, IdentityHash};

/// Identity under which registry versions are stored.
///
/// Hash of the bare object `{0: 6}`. Channel identities always carry type
/// code 7 so the two can never coincide.
pub fn registry_identity() -> IdentityHash {
    let mut buf = Vec::with_capacity(3);
    begin_object(&mut buf, ObjectType::RegistrySnapshot, 0);
    IdentityHash(ObjectHash::hash(&buf).0)
}

/// One version of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub members: BTreeSet<ChannelKey>,
}

impl RegistrySnapshot {
    /// Build a snapshot from any set of keys.
    pub fn from_members(members: impl IntoIterator<Item = ChannelKey>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }

    pub fn contains(&self, key: &ChannelKey) -> bool {
        self.members.contains(key)
    }

    /// Add every member of `other` to this snapshot.
    pub fn union_with(&mut self, other: &RegistrySnapshot) {
        self.members.extend(other.members.iter().cloned());
    }

    /// Encode to canonical bytes.
    ///
    /// Format: `{0: 6, 1: [[channel_id, owner | null], ...]}` with members in
    /// key order.
    pub fn to_canonical(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 48 * self.members.len());
        begin_object(&mut buf, ObjectType::RegistrySnapshot, 1);
        key(&mut buf, 1);
        encode_uint(&mut buf, 4, self.members.len() as u64);
        for member in &self.members {
            encode_uint(&mut buf, 4, 2);
            encode_text(&mut buf, &member.channel_id);
            encode_opt_hash(&mut buf, member.owner.as_ref().map(|o| o.as_bytes()));
        }
        buf
    }

    /// Decode from canonical bytes.
    pub fn from_canonical(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        let fields = Fields::open(&value, ObjectType::RegistrySnapshot)?;
        let members = fields
            .array(1)?
            .iter()
            .map(decode_member)
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self { members })
    }
}

fn decode_member(value: &Value) -> Result<ChannelKey> {
    let malformed = || CoreError::MalformedObject("invalid registry member".into());
    let pair = match value {
        Value::Array(pair) if pair.len() == 2 => pair,
        _ => return Err(malformed()),
    };
    let channel_id = match &pair[0] {
        Value::Text(s) => s.clone(),
        _ => return Err(malformed()),
    };
    let owner = match &pair[1] {
        Value::Null => None,
        other => Some(OwnerId(hash_from_value(other).ok_or_else(malformed)?)),
    };
    Ok(ChannelKey::new(channel_id, owner))
}
