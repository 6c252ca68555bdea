//! Test fixtures and helpers.
//!
//! Common setup code for integration tests, property tests and benchmarks.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use chanlog::{ChannelManager, ManagerConfig, Result};
use chanlog_core::{ChannelObject, HeadVersion, OwnerId, Payload};
use chanlog_store::MemoryStore;

/// A numeric reading, the stock typed object of the test suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub value: i64,
}

impl ChannelObject for Reading {
    const TYPE_NAME: &'static str = "Reading";
}

/// A manager over a fresh memory store.
pub struct ChannelFixture {
    pub store: Arc<MemoryStore>,
    pub manager: ChannelManager<MemoryStore>,
}

impl ChannelFixture {
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    pub fn with_config(config: ManagerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            manager: ChannelManager::new(store.clone(), config),
            store,
        }
    }

    /// Post one payload per timestamp, in the given order.
    pub async fn post_series(
        &self,
        channel_id: &str,
        owner: Option<OwnerId>,
        timestamps: &[i64],
    ) -> Result<Option<HeadVersion>> {
        let mut head = None;
        for ts in timestamps {
            let payload = series_payload(channel_id, *ts);
            head = Some(
                self.manager
                    .post_to_channel_at(channel_id, &payload, owner, *ts)
                    .await?,
            );
        }
        Ok(head)
    }

    /// Append `left` and `right` posts on top of `base`, leaving two leaves.
    pub async fn fork(
        &self,
        base: &HeadVersion,
        left: usize,
        right: usize,
    ) -> Result<(HeadVersion, HeadVersion)> {
        let left = self.extend(base, "left", left).await?;
        let right = self.extend(base, "right", right).await?;
        Ok((left, right))
    }

    async fn extend(&self, base: &HeadVersion, side: &str, count: usize) -> Result<HeadVersion> {
        let mut head = base.clone();
        for i in 0..count {
            let payload = Payload::bytes("fork", format!("{side}-{i}").into_bytes());
            head = self.manager.append_to_version(&head.version, &payload).await?;
        }
        Ok(head)
    }
}

impl Default for ChannelFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// The payload [`ChannelFixture::post_series`] posts at `timestamp`.
pub fn series_payload(channel_id: &str, timestamp: i64) -> Payload {
    Payload::bytes("series", format!("{channel_id}:{timestamp}").into_bytes())
}

/// Deterministic owners for multi-owner tests.
pub fn owners(count: usize) -> Vec<OwnerId> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[31] = 0x0f;
            OwnerId::from_bytes(seed)
        })
        .collect()
}

/// Random opaque payloads of `len` bytes each.
pub fn random_payloads(count: usize, len: usize) -> Vec<Payload> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let body: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            Payload::bytes("random", body)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlog_core::Query;

    #[tokio::test]
    async fn test_post_series() {
        let fixture = ChannelFixture::new();
        let head = fixture.post_series("s", None, &[1, 2, 3]).await.unwrap();
        assert!(head.is_some());

        let objects = fixture.manager.get_objects(Query::new()).await.unwrap();
        let timestamps: Vec<i64> = objects.iter().map(|o| o.timestamp).collect();
        assert_eq!(timestamps, vec![3, 2, 1]);
        assert_eq!(objects[0].data, series_payload("s", 3));
    }

    #[tokio::test]
    async fn test_fork_leaves_two_leaves() {
        let fixture = ChannelFixture::new();
        let base = fixture.post_series("f", None, &[1]).await.unwrap().unwrap();
        let (left, right) = fixture.fork(&base, 2, 3).await.unwrap();

        let leaves = fixture.manager.leaves("f", None).await.unwrap();
        assert_eq!(leaves, vec![left.version, right.version]);
    }

    #[test]
    fn test_owners_are_distinct() {
        let owners = owners(4);
        assert_eq!(owners.len(), 4);
        assert_ne!(owners[0], owners[1]);
        assert_eq!(owners, super::owners(4));
    }

    #[test]
    fn test_random_payloads() {
        let payloads = random_payloads(3, 16);
        assert_eq!(payloads.len(), 3);
        assert!(payloads.iter().all(|p| p.type_name == "random"));
    }
}
