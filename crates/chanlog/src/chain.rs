//! Reading chains and heads back out of the store.

use std::sync::Arc;

use chanlog_core::{
    ChannelKey, CoreError, Entry, EntryId, Envelope, Head, HeadVersion, ObjectHash, OrderKey,
    Payload, VersionId,
};
use chanlog_store::ObjectStore;

use crate::error::{ChannelError, Result};

/// One loaded node of a chain: the entry and the envelope it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainNode {
    pub id: EntryId,
    pub entry: Entry,
    pub envelope: Envelope,
}

impl ChainNode {
    pub fn order_key(&self) -> OrderKey {
        self.envelope.order_key()
    }

    pub fn timestamp(&self) -> i64 {
        self.envelope.timestamp
    }
}

async fn require<S: ObjectStore + ?Sized>(store: &S, hash: ObjectHash) -> Result<bytes::Bytes> {
    store
        .get_immutable(&hash)
        .await?
        .ok_or(ChannelError::MissingObject(hash))
}

/// Load an entry and its envelope.
pub async fn load_node<S: ObjectStore + ?Sized>(store: &S, id: EntryId) -> Result<ChainNode> {
    let entry = Entry::from_canonical(&require(store, id.as_object()).await?)?;
    let envelope = Envelope::from_canonical(&require(store, entry.envelope).await?)?;
    Ok(ChainNode {
        id,
        entry,
        envelope,
    })
}

/// Load the payload an envelope points at.
pub async fn load_payload<S: ObjectStore + ?Sized>(store: &S, hash: ObjectHash) -> Result<Payload> {
    Ok(Payload::from_canonical(&require(store, hash).await?)?)
}

/// Resolve a version id to the channel head it stores.
///
/// Fails with [`ChannelError::UnknownVersion`] if the version does not exist
/// or is not a channel head.
pub async fn load_head<S: ObjectStore + ?Sized>(store: &S, version: &VersionId) -> Result<HeadVersion> {
    let object = store
        .get_versioned(version)
        .await?
        .ok_or(ChannelError::UnknownVersion(*version))?;

    let head = match Head::from_canonical(&object.data) {
        Ok(head) => head,
        Err(CoreError::UnexpectedObjectType { .. }) => {
            return Err(ChannelError::UnknownVersion(*version))
        }
        Err(e) => return Err(e.into()),
    };

    let resolved = HeadVersion::new(*version, head);
    if resolved.key.identity_hash() != object.identity {
        tracing::warn!(version = %version, channel = %resolved.key, "head stored under foreign identity");
        return Err(ChannelError::UnknownVersion(*version));
    }
    Ok(resolved)
}

/// The current head of a channel: its most recently written leaf.
///
/// Returns `None` for a channel that has never been created or posted to.
pub async fn current_head<S: ObjectStore + ?Sized>(
    store: &S,
    key: &ChannelKey,
) -> Result<Option<HeadVersion>> {
    let leaves = store.leaves(&key.identity_hash()).await?;
    match leaves.last() {
        Some(version) => Ok(Some(load_head(store, version).await?)),
        None => Ok(None),
    }
}

/// Lazy backward walk over one chain, newest entry first.
///
/// Each call to [`ChainWalker::next`] loads exactly one node, so a consumer
/// that stops early never touches the rest of the chain.
pub struct ChainWalker<S: ?Sized> {
    store: Arc<S>,
    next: Option<EntryId>,
    visited: usize,
}

impl<S: ObjectStore + ?Sized> ChainWalker<S> {
    pub fn new(store: Arc<S>, head: Option<EntryId>) -> Self {
        Self {
            store,
            next: head,
            visited: 0,
        }
    }

    pub async fn next(&mut self) -> Result<Option<ChainNode>> {
        let Some(id) = self.next else {
            return Ok(None);
        };
        let node = load_node(&*self.store, id).await?;
        self.next = node.entry.previous;
        self.visited += 1;
        Ok(Some(node))
    }

    /// Walk the rest of the chain, newest first.
    pub async fn collect(mut self) -> Result<Vec<ChainNode>> {
        let mut nodes = Vec::new();
        while let Some(node) = self.next().await? {
            nodes.push(node);
        }
        Ok(nodes)
    }

    /// Number of nodes loaded so far.
    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }
}
