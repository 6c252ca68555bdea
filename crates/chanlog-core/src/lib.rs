//! # chanlog core
//!
//! Pure primitives for chanlog: content hashes, canonical encoding, and the
//! objects that make up a channel's history.
//!
//! This crate contains no I/O and no storage. Everything here is a function
//! from values to canonical bytes and back.
//!
//! ## Key Types
//!
//! - [`Payload`] - Opaque typed content posted to a channel
//! - [`Envelope`] - Timestamp plus payload hash
//! - [`Entry`] - One node of a backward-linked writer chain
//! - [`Head`] / [`VersionNode`] - The versioned pointer to a chain and its DAG
//! - [`RegistrySnapshot`] - The set of known channels
//! - [`Query`] / [`ObjectData`] - What to read and what comes back
//!
//! ## Canonicalization
//!
//! All stored objects are encoded using deterministic CBOR. See [`canonical`].

pub mod canonical;
pub mod entry;
pub mod error;
pub mod hash;
pub mod head;
pub mod payload;
pub mod query;
pub mod registry;
pub mod types;

pub use canonical::{encode_value, identity_bytes, ObjectType};
pub use entry::{Entry, Envelope, OrderKey};
pub use error::{CoreError, Result};
pub use hash::{ObjectHash, OwnerId};
pub use head::{Head, HeadVersion, VersionNode};
pub use payload::{ChannelObject, Payload};
pub use query::{ObjectData, Order, OwnerFilter, Query};
pub use registry::{registry_identity, RegistrySnapshot};
pub use types::{ChannelKey, EntryId, IdentityHash, VersionId};

/// Re-export of the CBOR value type used for payload bodies.
pub use ciborium::value::Value;
