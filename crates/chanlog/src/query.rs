//! Chronological queries across channels.
//!
//! A query is a k-way merge over the chains of every channel it matches. Each
//! chain is a cursor; a binary heap holds the next unconsumed entry of every
//! cursor and the engine repeatedly pops the globally newest (or oldest) one.
//! Filters drop entries after they are popped, so they never disturb the
//! relative order of what remains.
//!
//! Results come back as a [`futures::Stream`]. Nothing is read until the
//! stream is first polled; dropping the stream is all it takes to cancel.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt, TryStreamExt};

use chanlog_core::{
    ChannelKey, ChannelObject, EntryId, ObjectData, Order, OrderKey, Payload, Query,
};
use chanlog_store::ObjectStore;

use crate::chain::{current_head, load_payload, ChainNode, ChainWalker};
use crate::error::{ChannelError, Result};
use crate::registry::Registry;

/// A lazy, finite stream of query results.
pub type ObjectStream<T> = Pin<Box<dyn Stream<Item = Result<ObjectData<T>>> + Send>>;

/// Runs queries against the channels of one store.
pub struct QueryEngine<S: ?Sized> {
    store: Arc<S>,
    registry: Registry<S>,
}

impl<S: ?Sized> Clone for QueryEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: self.registry.clone(),
        }
    }
}

impl<S: ObjectStore + ?Sized + 'static> QueryEngine<S> {
    pub fn new(store: Arc<S>, registry: Registry<S>) -> Self {
        Self { store, registry }
    }

    /// Stream every object matching `query` in the requested order.
    ///
    /// Channel heads are resolved on the first poll, so each stream reflects
    /// the heads current at that moment. Entries appended afterwards are not
    /// seen by a stream already in progress.
    pub fn iter(&self, query: Query) -> ObjectStream<Payload> {
        let state = MergeCursor {
            store: Arc::clone(&self.store),
            registry: self.registry.clone(),
            query,
            started: false,
            sources: Vec::new(),
            heap: BinaryHeap::new(),
            yielded: 0,
        };

        Box::pin(stream::try_unfold(state, |mut state| async move {
            let item = state.pull().await?;
            Ok(item.map(|item| (item, state)))
        }))
    }

    /// Stream objects of type `T`, decoded.
    pub fn iter_typed<T: ChannelObject>(&self, query: Query) -> ObjectStream<T> {
        Box::pin(self.iter(query.of_type::<T>()).map(|result| {
            result.and_then(|item| {
                item.try_map(|payload| payload.decode::<T>())
                    .map_err(ChannelError::from)
            })
        }))
    }

    /// Run `query` to completion.
    pub async fn collect(&self, query: Query) -> Result<Vec<ObjectData<Payload>>> {
        self.iter(query).try_collect().await
    }

    /// Find one entry of `channel_id` by id.
    ///
    /// The owner, type and timestamp filters of `query` still apply; its
    /// count and order do not.
    pub async fn find_by_id(
        &self,
        channel_id: &str,
        id: &EntryId,
        query: Query,
    ) -> Result<ObjectData<Payload>> {
        let query = Query {
            channel_id: Some(channel_id.to_string()),
            count: None,
            order: Order::Descending,
            ..query
        };

        let mut results = self.iter(query);
        while let Some(item) = results.try_next().await? {
            if item.id == *id {
                return Ok(item);
            }
        }
        Err(ChannelError::ObjectNotFound(*id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// K-way merge
// ─────────────────────────────────────────────────────────────────────────────

/// Where a cursor reads its chain from.
enum ChainSource<S: ?Sized> {
    /// Newest first, one node per pull.
    Lazy(ChainWalker<S>),
    /// A fully read chain, oldest first.
    Buffered(std::vec::IntoIter<ChainNode>),
}

struct Source<S: ?Sized> {
    key: ChannelKey,
    chain: ChainSource<S>,
}

/// The next unconsumed node of one source.
struct Pending {
    rank: (OrderKey, EntryId, usize),
    node: ChainNode,
    descending: bool,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; ascending order pops the smallest rank.
        if self.descending {
            self.rank.cmp(&other.rank)
        } else {
            other.rank.cmp(&self.rank)
        }
    }
}

struct MergeCursor<S: ?Sized> {
    store: Arc<S>,
    registry: Registry<S>,
    query: Query,
    started: bool,
    sources: Vec<Source<S>>,
    heap: BinaryHeap<Pending>,
    yielded: usize,
}

impl<S: ObjectStore + ?Sized> MergeCursor<S> {
    fn descending(&self) -> bool {
        self.query.order == Order::Descending
    }

    /// Resolve the matching channels and prime one node per chain.
    async fn start(&mut self) -> Result<()> {
        self.started = true;
        if self.query.is_empty() {
            return Ok(());
        }

        for key in self.registry.list().await? {
            if !self.query.matches_key(&key) {
                continue;
            }
            let Some(head) = current_head(&*self.store, &key).await? else {
                continue;
            };
            if head.head_entry.is_none() {
                continue;
            }

            let walker = ChainWalker::new(Arc::clone(&self.store), head.head_entry);
            let chain = if self.descending() {
                ChainSource::Lazy(walker)
            } else {
                let mut nodes = walker.collect().await?;
                nodes.reverse();
                ChainSource::Buffered(nodes.into_iter())
            };

            self.sources.push(Source { key, chain });
            self.advance(self.sources.len() - 1).await?;
        }

        tracing::debug!(
            chains = self.sources.len(),
            order = ?self.query.order,
            "started query"
        );
        Ok(())
    }

    /// Push the next node of `source` onto the heap, if it has one.
    async fn advance(&mut self, source: usize) -> Result<()> {
        let next = match &mut self.sources[source].chain {
            ChainSource::Lazy(walker) => walker.next().await?,
            ChainSource::Buffered(nodes) => nodes.next(),
        };

        if let Some(node) = next {
            self.heap.push(Pending {
                rank: (node.order_key(), node.id, source),
                node,
                descending: self.descending(),
            });
        }
        Ok(())
    }

    async fn pull(&mut self) -> Result<Option<ObjectData<Payload>>> {
        if !self.started {
            self.start().await?;
        }

        loop {
            if self.query.count.is_some_and(|count| self.yielded >= count) {
                return Ok(None);
            }

            let Some(Pending { rank, node, .. }) = self.heap.pop() else {
                return Ok(None);
            };
            let source = rank.2;
            self.advance(source).await?;

            if !self.query.matches_timestamp(node.timestamp()) {
                continue;
            }

            let payload = load_payload(&*self.store, node.envelope.payload).await?;
            if !self.query.matches_type(&payload.type_name) {
                continue;
            }

            self.yielded += 1;
            let key = &self.sources[source].key;
            return Ok(Some(ObjectData {
                channel_id: key.channel_id.clone(),
                owner: key.owner,
                timestamp: node.timestamp(),
                id: node.id,
                payload_hash: node.envelope.payload,
                data: payload,
            }));
        }
    }
}
