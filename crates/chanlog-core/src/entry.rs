//! Envelopes and entries: the immutable nodes of a channel's history.
//!
//! An [`Envelope`] stamps a payload hash with its creation time. An [`Entry`]
//! points at an envelope and at the previous entry of the same writer chain,
//! forming a backward-linked, content-addressed list. A node can never point
//! at itself or a descendant: its hash would have to be known before it was
//! computed.

use serde::{Deserialize, Serialize};

use crate::canonical::{
    begin_object, decode_value, encode_bytes, encode_i64, encode_opt_hash, key, Fields, ObjectType,
};
use crate::error::Result;
use crate::hash::ObjectHash;
use crate::types::EntryId;

/// Timestamp plus payload hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Envelope {
    /// Wall-clock creation time (Unix milliseconds). Writer-claimed.
    pub timestamp: i64,
    /// Hash of the canonical payload.
    pub payload: ObjectHash,
}

impl Envelope {
    /// Create an envelope.
    pub fn new(timestamp: i64, payload: ObjectHash) -> Self {
        Self { timestamp, payload }
    }

    /// Encode to canonical bytes.
    ///
    /// Format: `{0: 2, 1: timestamp, 2: payload_hash}`
    pub fn to_canonical(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(48);
        begin_object(&mut buf, ObjectType::Envelope, 2);
        key(&mut buf, 1);
        encode_i64(&mut buf, self.timestamp);
        key(&mut buf, 2);
        encode_bytes(&mut buf, self.payload.as_bytes());
        buf
    }

    /// Decode from canonical bytes.
    pub fn from_canonical(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        let fields = Fields::open(&value, ObjectType::Envelope)?;
        Ok(Self {
            timestamp: fields.int(1)?,
            payload: ObjectHash(fields.hash(2)?),
        })
    }

    /// Content hash of the canonical encoding.
    pub fn compute_id(&self) -> ObjectHash {
        ObjectHash::hash(&self.to_canonical())
    }

    /// The chronological sort key of this envelope.
    pub fn order_key(&self) -> OrderKey {
        OrderKey {
            timestamp: self.timestamp,
            payload: self.payload,
        }
    }
}

/// One node of a writer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    /// Hash of the envelope.
    pub envelope: ObjectHash,
    /// The entry before this one, `None` for the first entry of a chain.
    pub previous: Option<EntryId>,
}

impl Entry {
    /// Create an entry.
    pub fn new(envelope: ObjectHash, previous: Option<EntryId>) -> Self {
        Self { envelope, previous }
    }

    /// Encode to canonical bytes.
    ///
    /// Format: `{0: 3, 1: envelope_hash, 2: previous_entry | null}`
    pub fn to_canonical(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(80);
        begin_object(&mut buf, ObjectType::Entry, 2);
        key(&mut buf, 1);
        encode_bytes(&mut buf, self.envelope.as_bytes());
        key(&mut buf, 2);
        encode_opt_hash(&mut buf, self.previous.as_ref().map(|p| p.as_bytes()));
        buf
    }

    /// Decode from canonical bytes.
    pub fn from_canonical(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        let fields = Fields::open(&value, ObjectType::Entry)?;
        Ok(Self {
            envelope: ObjectHash(fields.hash(1)?),
            previous: fields.opt_hash(2)?.map(EntryId),
        })
    }

    /// Compute the entry id (Blake3 hash of canonical bytes).
    pub fn compute_id(&self) -> EntryId {
        EntryId(ObjectHash::hash(&self.to_canonical()).0)
    }
}

/// Chronological ordering key shared by merge and query.
///
/// Entries are ordered by timestamp; equal timestamps are broken by the
/// payload hash so that the order never depends on which side of a merge or
/// which chain of a query an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    pub timestamp: i64,
    pub payload: ObjectHash,
}
