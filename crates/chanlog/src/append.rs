//! The append path: payload, envelope, entry, new head version.

use std::sync::Arc;

use chanlog_core::{ChannelKey, Entry, Envelope, Head, HeadVersion, Payload};
use chanlog_store::ObjectStore;

use crate::chain::load_node;
use crate::clock::Clock;
use crate::error::{ChannelError, Result};

/// Appends one payload to one channel.
///
/// The engine takes the base version explicitly and never re-reads the
/// channel, so two appends against the same base both succeed and fork the
/// channel instead of one of them failing.
pub struct AppendEngine<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<Clock>,
}

impl<S: ?Sized> Clone for AppendEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: ObjectStore + ?Sized> AppendEngine<S> {
    pub fn new(store: Arc<S>, clock: Arc<Clock>) -> Self {
        Self { store, clock }
    }

    /// Append `payload` on top of `base`, or start the channel if `base` is
    /// `None`.
    ///
    /// Without an explicit `timestamp` the entry is stamped by the clock and
    /// kept strictly after the entry it follows. An explicit timestamp is used
    /// verbatim.
    ///
    /// Exactly one new head version is written per call.
    pub async fn append(
        &self,
        key: &ChannelKey,
        base: Option<&HeadVersion>,
        payload: &Payload,
        timestamp: Option<i64>,
    ) -> Result<HeadVersion> {
        if let Some(base) = base {
            if base.key != *key {
                return Err(ChannelError::MismatchedChannels {
                    left: key.clone(),
                    right: base.key.clone(),
                });
            }
        }

        let previous = base.and_then(|b| b.head_entry);

        let timestamp = match timestamp {
            Some(ts) => ts,
            None => {
                let previous_ts = match previous {
                    Some(id) => Some(load_node(&*self.store, id).await?.timestamp()),
                    None => None,
                };
                self.clock.after(previous_ts)
            }
        };

        let payload_hash = self.store.put_immutable(&payload.to_canonical()?).await?;

        let envelope = Envelope::new(timestamp, payload_hash);
        let envelope_hash = self.store.put_immutable(&envelope.to_canonical()).await?;

        let entry = Entry::new(envelope_hash, previous);
        let entry_id = entry.compute_id();
        self.store.put_immutable(&entry.to_canonical()).await?;

        let head = Head::at(key, entry_id);
        let parents: Vec<_> = base.map(|b| b.version).into_iter().collect();
        let version = self
            .store
            .put_versioned(&key.identity_hash(), &head.to_canonical(), &parents)
            .await?;

        tracing::debug!(
            channel = %key,
            version = %version,
            entry = %entry_id,
            timestamp,
            "appended entry"
        );

        Ok(HeadVersion::new(version, head))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainWalker;
    use chanlog_core::OwnerId;
    use chanlog_store::MemoryStore;

    fn engine() -> (Arc<MemoryStore>, AppendEngine<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = AppendEngine::new(store.clone(), Arc::new(Clock::default()));
        (store, engine)
    }

    #[tokio::test]
    async fn test_append_builds_a_chain() {
        let (store, engine) = engine();
        let key = ChannelKey::new("log", None);

        let first = engine
            .append(&key, None, &Payload::bytes("t", b"1".to_vec()), None)
            .await
            .unwrap();
        let second = engine
            .append(&key, Some(&first), &Payload::bytes("t", b"2".to_vec()), None)
            .await
            .unwrap();

        assert_ne!(first.version, second.version);
        let nodes = ChainWalker::new(store.clone(), second.head_entry)
            .collect()
            .await
            .unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].timestamp() > nodes[1].timestamp());
        assert_eq!(nodes[1].id, first.head_entry.unwrap());

        let leaves = store.leaves(&key.identity_hash()).await.unwrap();
        assert_eq!(leaves, vec![second.version]);
    }

    #[tokio::test]
    async fn test_explicit_timestamp_is_verbatim() {
        let (store, engine) = engine();
        let key = ChannelKey::new("log", None);

        let head = engine
            .append(&key, None, &Payload::bytes("t", vec![]), Some(42))
            .await
            .unwrap();
        let node = load_node(&*store, head.head_entry.unwrap()).await.unwrap();
        assert_eq!(node.timestamp(), 42);
    }

    #[tokio::test]
    async fn test_same_base_forks() {
        let (store, engine) = engine();
        let key = ChannelKey::new("log", Some(OwnerId::derive("alice")));

        let base = engine
            .append(&key, None, &Payload::bytes("t", b"base".to_vec()), None)
            .await
            .unwrap();
        let left = engine
            .append(&key, Some(&base), &Payload::bytes("t", b"l".to_vec()), None)
            .await
            .unwrap();
        let right = engine
            .append(&key, Some(&base), &Payload::bytes("t", b"r".to_vec()), None)
            .await
            .unwrap();

        let leaves = store.leaves(&key.identity_hash()).await.unwrap();
        assert_eq!(leaves, vec![left.version, right.version]);
    }

    #[tokio::test]
    async fn test_base_of_other_channel_rejected() {
        let (_store, engine) = engine();
        let a = ChannelKey::new("a", None);
        let b = ChannelKey::new("b", None);

        let head = engine
            .append(&a, None, &Payload::bytes("t", vec![]), None)
            .await
            .unwrap();
        let err = engine
            .append(&b, Some(&head), &Payload::bytes("t", vec![]), None)
            .await
            .unwrap_err();
        assert!(err.is_misuse());
    }
}
