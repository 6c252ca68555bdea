//! In-memory implementation of the ObjectStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use chanlog_core::{IdentityHash, ObjectHash, VersionId, VersionNode};

use crate::error::{Result, StoreError};
use crate::traits::{ObjectStore, VersionedObject};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Immutable objects indexed by content hash.
    objects: HashMap<ObjectHash, Bytes>,

    /// Version nodes indexed by version id.
    versions: HashMap<VersionId, VersionNode>,

    /// Per-identity version ids in write order.
    history: HashMap<IdentityHash, Vec<VersionId>>,

    /// Per-identity leaves in write order.
    leaves: HashMap<IdentityHash, Vec<VersionId>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Number of immutable objects held.
    pub fn object_count(&self) -> Result<usize> {
        Ok(self.read()?.objects.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_immutable(&self, bytes: &[u8]) -> Result<ObjectHash> {
        let hash = ObjectHash::hash(bytes);
        let mut inner = self.write()?;
        inner
            .objects
            .entry(hash)
            .or_insert_with(|| Bytes::copy_from_slice(bytes));
        Ok(hash)
    }

    async fn get_immutable(&self, hash: &ObjectHash) -> Result<Option<Bytes>> {
        let inner = self.read()?;
        Ok(inner.objects.get(hash).cloned())
    }

    async fn has_immutable(&self, hash: &ObjectHash) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner.objects.contains_key(hash))
    }

    async fn put_versioned(
        &self,
        identity: &IdentityHash,
        bytes: &[u8],
        parents: &[VersionId],
    ) -> Result<VersionId> {
        let data = ObjectHash::hash(bytes);
        let node = VersionNode::new(*identity, data, parents.to_vec());
        let version = node.compute_id();

        let mut inner = self.write()?;

        // Validate parents before touching anything
        for parent in &node.parents {
            match inner.versions.get(parent) {
                Some(existing) if existing.identity == *identity => {}
                _ => {
                    return Err(StoreError::UnknownVersion {
                        version: *parent,
                        identity: *identity,
                    })
                }
            }
        }

        // Same data, same parents: already written
        if inner.versions.contains_key(&version) {
            return Ok(version);
        }

        inner
            .objects
            .entry(data)
            .or_insert_with(|| Bytes::copy_from_slice(bytes));

        let leaves = inner.leaves.entry(*identity).or_default();
        leaves.retain(|leaf| !node.parents.contains(leaf));
        leaves.push(version);

        inner.history.entry(*identity).or_default().push(version);
        inner.versions.insert(version, node);

        Ok(version)
    }

    async fn get_versioned(&self, version: &VersionId) -> Result<Option<VersionedObject>> {
        let inner = self.read()?;

        let Some(node) = inner.versions.get(version) else {
            return Ok(None);
        };

        let data = inner.objects.get(&node.data).cloned().ok_or_else(|| {
            StoreError::InvalidData(format!(
                "version {} references missing data {}",
                version, node.data
            ))
        })?;

        Ok(Some(VersionedObject {
            version: *version,
            identity: node.identity,
            parents: node.parents.clone(),
            data,
        }))
    }

    async fn list_version_history(&self, identity: &IdentityHash) -> Result<Vec<VersionId>> {
        let inner = self.read()?;
        Ok(inner.history.get(identity).cloned().unwrap_or_default())
    }

    async fn leaves(&self, identity: &IdentityHash) -> Result<Vec<VersionId>> {
        let inner = self.read()?;
        Ok(inner.leaves.get(identity).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;

    fn identity(n: u8) -> IdentityHash {
        IdentityHash::from_bytes([n; 32])
    }

    #[tokio::test]
    async fn test_immutable_idempotent() {
        let store = MemoryStore::new();
        let a = store.put_immutable(b"hello").await.unwrap();
        let b = store.put_immutable(b"hello").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.object_count().unwrap(), 1);
        assert_eq!(store.get_immutable(&a).await.unwrap().unwrap(), Bytes::from_static(b"hello"));
        assert!(store.has_immutable(&a).await.unwrap());
    }

    #[tokio::test]
    async fn test_require_missing_object() {
        let store = MemoryStore::new();
        let err = store.require_immutable(&ObjectHash::ZERO).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_linear_versions() {
        let store = MemoryStore::new();
        let id = identity(1);

        let v1 = store.put_versioned(&id, b"one", &[]).await.unwrap();
        let v2 = store.put_versioned(&id, b"two", &[v1]).await.unwrap();

        assert_eq!(store.leaves(&id).await.unwrap(), vec![v2]);
        assert_eq!(store.list_version_history(&id).await.unwrap(), vec![v1, v2]);

        let object = store.get_versioned(&v2).await.unwrap().unwrap();
        assert_eq!(object.identity, id);
        assert_eq!(object.parents, vec![v1]);
        assert_eq!(object.data, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_concurrent_writers_fork() {
        let store = MemoryStore::new();
        let id = identity(1);

        let base = store.put_versioned(&id, b"base", &[]).await.unwrap();
        let left = store.put_versioned(&id, b"left", &[base]).await.unwrap();
        let right = store.put_versioned(&id, b"right", &[base]).await.unwrap();

        assert_eq!(store.leaves(&id).await.unwrap(), vec![left, right]);

        let merged = store.put_versioned(&id, b"merged", &[right, left]).await.unwrap();
        assert_eq!(store.leaves(&id).await.unwrap(), vec![merged]);
        assert_eq!(store.list_version_history(&id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_rewrite_is_noop() {
        let store = MemoryStore::new();
        let id = identity(1);

        let v1 = store.put_versioned(&id, b"same", &[]).await.unwrap();
        let again = store.put_versioned(&id, b"same", &[]).await.unwrap();
        assert_eq!(v1, again);
        assert_eq!(store.list_version_history(&id).await.unwrap(), vec![v1]);
    }

    #[tokio::test]
    async fn test_parent_of_other_identity_rejected() {
        let store = MemoryStore::new();
        let foreign = store.put_versioned(&identity(1), b"a", &[]).await.unwrap();

        let err = store
            .put_versioned(&identity(2), b"b", &[foreign])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownVersion { .. }));
        assert!(store.leaves(&identity(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let store = MemoryStore::new();
        let a = store.put_versioned(&identity(1), b"x", &[]).await.unwrap();
        let b = store.put_versioned(&identity(2), b"x", &[]).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.leaves(&identity(1)).await.unwrap(), vec![a]);
        assert_eq!(store.leaves(&identity(2)).await.unwrap(), vec![b]);
    }
}
