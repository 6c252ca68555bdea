//! Discovery of known channels.

use std::sync::Arc;

use chanlog_core::{registry_identity, ChannelKey, IdentityHash, RegistrySnapshot, VersionId};
use chanlog_store::{ObjectStore, StoreExt};

use crate::error::Result;

/// The set of channels known to one store.
///
/// Membership lives in the store itself as a versioned [`RegistrySnapshot`],
/// so two registries over the same store handle agree and registries over
/// different stores never see each other's channels.
pub struct Registry<S: ?Sized> {
    store: Arc<S>,
    identity: IdentityHash,
}

impl<S: ?Sized> Clone for Registry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            identity: self.identity,
        }
    }
}

impl<S: ObjectStore + ?Sized> Registry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            identity: registry_identity(),
        }
    }

    /// Union of every current registry leaf, plus those leaves.
    async fn snapshot(&self) -> Result<(RegistrySnapshot, Vec<VersionId>)> {
        let leaves = self.store.leaves(&self.identity).await?;
        let mut snapshot = RegistrySnapshot::default();
        for leaf in &leaves {
            let object = self.store.require_versioned(leaf).await?;
            snapshot.union_with(&RegistrySnapshot::from_canonical(&object.data)?);
        }
        Ok((snapshot, leaves))
    }

    /// Add `key` to the registry. Returns `true` if it was not known before.
    ///
    /// A new registry version supersedes every current leaf, so registering
    /// also heals a forked registry.
    pub async fn ensure_registered(&self, key: &ChannelKey) -> Result<bool> {
        let (mut snapshot, leaves) = self.snapshot().await?;
        if snapshot.contains(key) {
            return Ok(false);
        }

        snapshot.members.insert(key.clone());
        self.store
            .put_versioned(&self.identity, &snapshot.to_canonical(), &leaves)
            .await?;

        tracing::debug!(channel = %key, members = snapshot.members.len(), "registered channel");
        Ok(true)
    }

    /// All known channels in key order.
    pub async fn list(&self) -> Result<Vec<ChannelKey>> {
        let (snapshot, _) = self.snapshot().await?;
        Ok(snapshot.members.into_iter().collect())
    }

    pub async fn contains(&self, key: &ChannelKey) -> Result<bool> {
        let (snapshot, _) = self.snapshot().await?;
        Ok(snapshot.contains(key))
    }
}
