//! ObjectStore trait: the abstract interface to content-addressed storage.
//!
//! Channel logic is storage-agnostic. Implementations include SQLite
//! (persistent) and in-memory (for tests and embedding).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chanlog_core::{IdentityHash, ObjectHash, VersionId};

use crate::error::{Result, StoreError};

/// One stored version of a versioned object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedObject {
    pub version: VersionId,
    pub identity: IdentityHash,
    /// Versions this one supersedes, sorted.
    pub parents: Vec<VersionId>,
    pub data: Bytes,
}

impl VersionedObject {
    /// Whether this version has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// The ObjectStore trait: async interface for object persistence.
///
/// Two kinds of storage live behind one handle:
///
/// - **Immutable objects** are keyed by the Blake3 hash of their bytes. Writing
///   the same bytes twice is a no-op that returns the same hash.
/// - **Versioned objects** are keyed by an identity. Each write creates a new
///   version naming its parents; nothing is ever overwritten. A version that
///   is not the parent of any other version is a *leaf*. Two writers that name
///   the same parent both succeed and leave two leaves behind.
///
/// # Design Notes
///
/// - **Content-addressed versions**: a version id is the hash of its
///   `VersionNode`, so writing the same data with the same parents twice
///   yields the same version and is a no-op.
/// - **Parent validation**: every parent must already be a version of the same
///   identity, otherwise the write fails with [`StoreError::UnknownVersion`].
/// - **Write order**: history and leaves are reported in local write order.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Immutable Objects
    // ─────────────────────────────────────────────────────────────────────────

    /// Store bytes and return their content hash.
    async fn put_immutable(&self, bytes: &[u8]) -> Result<ObjectHash>;

    /// Get the bytes stored under a content hash.
    async fn get_immutable(&self, hash: &ObjectHash) -> Result<Option<Bytes>>;

    /// Check if an immutable object exists.
    async fn has_immutable(&self, hash: &ObjectHash) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Versioned Objects
    // ─────────────────────────────────────────────────────────────────────────

    /// Write a new version of `identity` superseding `parents`.
    ///
    /// The parents are removed from the leaf set and the new version is added
    /// to it. Parents that are not leaves any more are still accepted; this is
    /// how forks arise.
    async fn put_versioned(
        &self,
        identity: &IdentityHash,
        bytes: &[u8],
        parents: &[VersionId],
    ) -> Result<VersionId>;

    /// Get a version by its id.
    async fn get_versioned(&self, version: &VersionId) -> Result<Option<VersionedObject>>;

    /// All versions of `identity` in local write order, forked ones included.
    async fn list_version_history(&self, identity: &IdentityHash) -> Result<Vec<VersionId>>;

    /// Current leaves of `identity` in local write order.
    ///
    /// More than one leaf means the identity is forked.
    async fn leaves(&self, identity: &IdentityHash) -> Result<Vec<VersionId>>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    async fn put_immutable(&self, bytes: &[u8]) -> Result<ObjectHash> {
        (**self).put_immutable(bytes).await
    }

    async fn get_immutable(&self, hash: &ObjectHash) -> Result<Option<Bytes>> {
        (**self).get_immutable(hash).await
    }

    async fn has_immutable(&self, hash: &ObjectHash) -> Result<bool> {
        (**self).has_immutable(hash).await
    }

    async fn put_versioned(
        &self,
        identity: &IdentityHash,
        bytes: &[u8],
        parents: &[VersionId],
    ) -> Result<VersionId> {
        (**self).put_versioned(identity, bytes, parents).await
    }

    async fn get_versioned(&self, version: &VersionId) -> Result<Option<VersionedObject>> {
        (**self).get_versioned(version).await
    }

    async fn list_version_history(&self, identity: &IdentityHash) -> Result<Vec<VersionId>> {
        (**self).list_version_history(identity).await
    }

    async fn leaves(&self, identity: &IdentityHash) -> Result<Vec<VersionId>> {
        (**self).leaves(identity).await
    }
}

/// Extension trait for common store patterns.
pub trait StoreExt: ObjectStore {
    /// Get an immutable object that must exist.
    fn require_immutable(
        &self,
        hash: &ObjectHash,
    ) -> impl std::future::Future<Output = Result<Bytes>> + Send;

    /// Get a version that must exist.
    fn require_versioned(
        &self,
        version: &VersionId,
    ) -> impl std::future::Future<Output = Result<VersionedObject>> + Send;
}

impl<S: ObjectStore + ?Sized> StoreExt for S {
    async fn require_immutable(&self, hash: &ObjectHash) -> Result<Bytes> {
        self.get_immutable(hash)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("object {}", hash.to_hex())))
    }

    async fn require_versioned(&self, version: &VersionId) -> Result<VersionedObject> {
        self.get_versioned(version)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("version {}", version.to_hex())))
    }
}
