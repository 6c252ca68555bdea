//! The channel manager: one handle over registry, append, merge and query.

use std::sync::Arc;

use futures::TryStreamExt;

use chanlog_core::{
    ChannelKey, ChannelObject, EntryId, Head, HeadVersion, ObjectData, OwnerId, Payload, Query,
    VersionId,
};
use chanlog_store::ObjectStore;

use crate::append::AppendEngine;
use crate::chain::{self, load_head};
use crate::clock::Clock;
use crate::error::Result;
use crate::events::{ChannelUpdated, EventBus, UpdateCause, UpdateStream};
use crate::merge::MergeEngine;
use crate::query::{ObjectStream, QueryEngine};
use crate::registry::Registry;

/// Configuration for the [`ChannelManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Buffer size of the update broadcast channel.
    pub event_capacity: usize,
    /// Merge every leaf of a channel as soon as an append leaves it forked.
    pub merge_on_write: bool,
    /// Never hand out a clock reading lower than a previous one.
    pub monotonic_timestamps: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            merge_on_write: false,
            monotonic_timestamps: true,
        }
    }
}

/// A known channel and the state of its version history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub key: ChannelKey,
    /// Current leaves in write order. The last one is the current head.
    pub leaves: Vec<VersionId>,
    /// Whether the channel has more than one leaf.
    pub forked: bool,
}

/// The main entry point for channel logs.
///
/// Provides a unified API for:
/// - Creating channels and posting payloads to them
/// - Querying objects across channels in timestamp order
/// - Merging forked channel heads
/// - Subscribing to channel updates
///
/// Posting reads the current head optimistically and never locks. Two posts
/// racing on one channel both succeed and leave a fork behind, which stays
/// until it is merged, either explicitly or by `merge_on_write`.
pub struct ChannelManager<S: ?Sized> {
    store: Arc<S>,
    config: ManagerConfig,
    registry: Registry<S>,
    append: AppendEngine<S>,
    merge: MergeEngine<S>,
    query: QueryEngine<S>,
    events: EventBus,
}

impl<S: ?Sized> Clone for ChannelManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            registry: self.registry.clone(),
            append: self.append.clone(),
            merge: self.merge.clone(),
            query: self.query.clone(),
            events: self.events.clone(),
        }
    }
}

impl<S: ObjectStore + ?Sized + 'static> ChannelManager<S> {
    /// Create a manager over `store`.
    ///
    /// Managers sharing a store see the same channels. Updates are only
    /// delivered to subscribers of the manager that made them.
    pub fn new(store: Arc<S>, config: ManagerConfig) -> Self {
        let registry = Registry::new(Arc::clone(&store));
        let clock = Arc::new(Clock::new(config.monotonic_timestamps));
        Self {
            append: AppendEngine::new(Arc::clone(&store), clock),
            merge: MergeEngine::new(Arc::clone(&store)),
            query: QueryEngine::new(Arc::clone(&store), registry.clone()),
            events: EventBus::new(config.event_capacity),
            registry,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Channel Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a channel, or return its current head if it already exists.
    ///
    /// A new channel starts with an empty head version.
    pub async fn create_channel(
        &self,
        channel_id: &str,
        owner: Option<OwnerId>,
    ) -> Result<HeadVersion> {
        let key = ChannelKey::new(channel_id, owner);
        self.registry.ensure_registered(&key).await?;

        if let Some(head) = chain::current_head(&*self.store, &key).await? {
            return Ok(head);
        }

        let head = Head::empty(&key);
        let version = self
            .store
            .put_versioned(&key.identity_hash(), &head.to_canonical(), &[])
            .await?;

        tracing::info!(channel = %key, version = %version, "created channel");
        Ok(HeadVersion::new(version, head))
    }

    /// Post a payload to a channel, creating the channel if needed.
    pub async fn post_to_channel(
        &self,
        channel_id: &str,
        payload: &Payload,
        owner: Option<OwnerId>,
    ) -> Result<HeadVersion> {
        self.post(ChannelKey::new(channel_id, owner), payload, None)
            .await
    }

    /// Post a payload with an explicit timestamp in milliseconds.
    pub async fn post_to_channel_at(
        &self,
        channel_id: &str,
        payload: &Payload,
        owner: Option<OwnerId>,
        timestamp: i64,
    ) -> Result<HeadVersion> {
        self.post(ChannelKey::new(channel_id, owner), payload, Some(timestamp))
            .await
    }

    /// Encode `object` and post it.
    pub async fn post_object<T: ChannelObject>(
        &self,
        channel_id: &str,
        object: &T,
        owner: Option<OwnerId>,
    ) -> Result<HeadVersion> {
        let payload = Payload::from_object(object)?;
        self.post(ChannelKey::new(channel_id, owner), &payload, None)
            .await
    }

    /// Append on top of a version the caller already holds.
    ///
    /// This does not look at the channel's current head. Appending twice to
    /// the same version forks the channel.
    pub async fn append_to_version(
        &self,
        version: &VersionId,
        payload: &Payload,
    ) -> Result<HeadVersion> {
        self.append_to(version, payload, None).await
    }

    /// [`append_to_version`](Self::append_to_version) with an explicit
    /// timestamp in milliseconds.
    pub async fn append_to_version_at(
        &self,
        version: &VersionId,
        payload: &Payload,
        timestamp: i64,
    ) -> Result<HeadVersion> {
        self.append_to(version, payload, Some(timestamp)).await
    }

    async fn append_to(
        &self,
        version: &VersionId,
        payload: &Payload,
        timestamp: Option<i64>,
    ) -> Result<HeadVersion> {
        let base = load_head(&*self.store, version).await?;
        let head = self
            .append
            .append(&base.key, Some(&base), payload, timestamp)
            .await?;
        self.after_append(head).await
    }

    async fn post(
        &self,
        key: ChannelKey,
        payload: &Payload,
        timestamp: Option<i64>,
    ) -> Result<HeadVersion> {
        let base = chain::current_head(&*self.store, &key).await?;
        if base.is_none() {
            self.registry.ensure_registered(&key).await?;
        }

        let head = self
            .append
            .append(&key, base.as_ref(), payload, timestamp)
            .await?;
        self.after_append(head).await
    }

    async fn after_append(&self, head: HeadVersion) -> Result<HeadVersion> {
        self.events.publish(ChannelUpdated {
            key: head.key.clone(),
            version: head.version,
            cause: UpdateCause::Append,
        });

        let leaves = self.store.leaves(&head.key.identity_hash()).await?;
        if leaves.len() > 1 {
            tracing::warn!(channel = %head.key, leaves = leaves.len(), "channel is forked");
            if self.config.merge_on_write {
                return self.merge_key(&head.key).await;
            }
        }
        Ok(head)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Merge Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge two head versions of one channel.
    pub async fn merge_channels(&self, a: &VersionId, b: &VersionId) -> Result<HeadVersion> {
        let merged = self.merge.merge(a, b).await?;
        if merged.version != *a && merged.version != *b {
            self.publish_merge(&merged);
        }
        Ok(merged)
    }

    /// Merge every current leaf of a channel into one head.
    pub async fn merge_all_leaves(
        &self,
        channel_id: &str,
        owner: Option<OwnerId>,
    ) -> Result<HeadVersion> {
        self.merge_key(&ChannelKey::new(channel_id, owner)).await
    }

    async fn merge_key(&self, key: &ChannelKey) -> Result<HeadVersion> {
        let leaves = self.store.leaves(&key.identity_hash()).await?;
        let merged = self.merge.merge_leaves(key).await?;
        if !leaves.contains(&merged.version) {
            self.publish_merge(&merged);
        }
        Ok(merged)
    }

    fn publish_merge(&self, merged: &HeadVersion) {
        self.events.publish(ChannelUpdated {
            key: merged.key.clone(),
            version: merged.version,
            cause: UpdateCause::Merge,
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_objects(&self, query: Query) -> Result<Vec<ObjectData<Payload>>> {
        self.query.collect(query).await
    }

    /// Objects of type `T`, decoded. Objects of other types are skipped.
    pub async fn get_objects_with_type<T: ChannelObject>(
        &self,
        query: Query,
    ) -> Result<Vec<ObjectData<T>>> {
        self.query.iter_typed::<T>(query).try_collect().await
    }

    /// Look up one entry of `channel_id`.
    ///
    /// Fails with [`ChannelError::ObjectNotFound`](crate::ChannelError::ObjectNotFound)
    /// if no entry with this id passes the filters of `query`.
    pub async fn get_object_by_id(
        &self,
        channel_id: &str,
        id: &EntryId,
        query: Query,
    ) -> Result<ObjectData<Payload>> {
        self.query.find_by_id(channel_id, id, query).await
    }

    pub async fn get_object_with_type_by_id<T: ChannelObject>(
        &self,
        channel_id: &str,
        id: &EntryId,
        query: Query,
    ) -> Result<ObjectData<T>> {
        let found = self
            .query
            .find_by_id(channel_id, id, query.of_type::<T>())
            .await?;
        Ok(found.try_map(|payload| payload.decode::<T>())?)
    }

    /// A lazy stream of query results.
    pub fn object_iterator(&self, query: Query) -> ObjectStream<Payload> {
        self.query.iter(query)
    }

    pub fn object_iterator_with_type<T: ChannelObject>(&self, query: Query) -> ObjectStream<T> {
        self.query.iter_typed::<T>(query)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────────

    /// The version new posts to this channel build on.
    pub async fn current_head(
        &self,
        channel_id: &str,
        owner: Option<OwnerId>,
    ) -> Result<Option<HeadVersion>> {
        chain::current_head(&*self.store, &ChannelKey::new(channel_id, owner)).await
    }

    /// Current leaves of a channel. More than one means it is forked.
    pub async fn leaves(&self, channel_id: &str, owner: Option<OwnerId>) -> Result<Vec<VersionId>> {
        let key = ChannelKey::new(channel_id, owner);
        Ok(self.store.leaves(&key.identity_hash()).await?)
    }

    /// Every head version of a channel ever written, in write order.
    pub async fn version_history(
        &self,
        channel_id: &str,
        owner: Option<OwnerId>,
    ) -> Result<Vec<VersionId>> {
        let key = ChannelKey::new(channel_id, owner);
        Ok(self.store.list_version_history(&key.identity_hash()).await?)
    }

    /// Known channels matching the channel and owner filters of `filter`.
    pub async fn channels(&self, filter: &Query) -> Result<Vec<ChannelInfo>> {
        let mut channels = Vec::new();
        for key in self.registry.list().await? {
            if !filter.matches_key(&key) {
                continue;
            }
            let leaves = self.store.leaves(&key.identity_hash()).await?;
            channels.push(ChannelInfo {
                forked: leaves.len() > 1,
                leaves,
                key,
            });
        }
        Ok(channels)
    }

    pub async fn has_channel(&self, channel_id: &str, owner: Option<OwnerId>) -> Result<bool> {
        self.registry
            .contains(&ChannelKey::new(channel_id, owner))
            .await
    }

    /// Receive a [`ChannelUpdated`] after every append and every merge that
    /// wrote a new version.
    pub fn subscribe(&self) -> UpdateStream {
        self.events.subscribe()
    }
}
