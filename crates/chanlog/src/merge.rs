//! Reconciling forked channel heads.
//!
//! Merging two head versions of one channel proceeds in four steps:
//!
//! 1. Walk both chains backward in lockstep until a node is seen on both
//!    sides. Because entries are content-addressed, the first shared node is
//!    the lowest common ancestor and everything older than it is identical.
//! 2. Everything newer than the ancestor on each side is that side's
//!    divergent prefix. Envelopes present on both sides are kept once.
//! 3. Order the union of both prefixes newest first by `(timestamp,
//!    payload_hash)` and relink it, oldest first, onto the ancestor. An entry
//!    whose `previous` changed gets a new id; its envelope stays the same.
//! 4. Write the result as a version whose parents are both inputs.
//!
//! Every step depends only on the set of inputs, never on their order, so
//! `merge(a, b)` and `merge(b, a)` write the same version.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chanlog_core::{ChannelKey, Entry, EntryId, Head, HeadVersion, ObjectHash, VersionId};
use chanlog_store::{ObjectStore, StoreExt};

use crate::chain::{load_head, ChainNode, ChainWalker};
use crate::error::{ChannelError, Result};

/// Result of splitting two chains at their lowest common ancestor.
#[derive(Debug)]
pub struct Divergence {
    /// The newest entry shared by both chains, if any.
    pub ancestor: Option<EntryId>,
    /// Entries only in the left chain, newest first.
    pub left: Vec<ChainNode>,
    /// Entries only in the right chain, newest first.
    pub right: Vec<ChainNode>,
}

/// Merges head versions of the same channel.
pub struct MergeEngine<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for MergeEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ObjectStore + ?Sized> MergeEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Merge Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge two head versions into one.
    ///
    /// Returns an input unchanged when merging adds nothing to it: when both
    /// inputs are the same version, or when one input is a version ancestor of
    /// the other and its entries are already on the other's chain.
    pub async fn merge(&self, a: &VersionId, b: &VersionId) -> Result<HeadVersion> {
        let left = load_head(&*self.store, a).await?;
        let right = load_head(&*self.store, b).await?;

        if left.key != right.key {
            return Err(ChannelError::MismatchedChannels {
                left: left.key,
                right: right.key,
            });
        }

        if left.version == right.version {
            return Ok(left);
        }

        let merged = self.merge_chains(left.head_entry, right.head_entry).await?;

        if merged == left.head_entry && self.is_version_ancestor(&right.version, &left.version).await? {
            tracing::debug!(channel = %left.key, version = %left.version, "merge is a no-op");
            return Ok(left);
        }
        if merged == right.head_entry && self.is_version_ancestor(&left.version, &right.version).await? {
            tracing::debug!(channel = %right.key, version = %right.version, "merge is a no-op");
            return Ok(right);
        }

        let head = match merged {
            Some(entry) => Head::at(&left.key, entry),
            None => Head::empty(&left.key),
        };
        let version = self
            .store
            .put_versioned(
                &left.key.identity_hash(),
                &head.to_canonical(),
                &[left.version, right.version],
            )
            .await?;

        tracing::info!(
            channel = %left.key,
            left = %left.version,
            right = %right.version,
            version = %version,
            "merged head versions"
        );

        Ok(HeadVersion::new(version, head))
    }

    /// Merge every current leaf of a channel into one version.
    ///
    /// Leaves are folded in version id order so that every replica holding the
    /// same leaves writes the same result.
    pub async fn merge_leaves(&self, key: &ChannelKey) -> Result<HeadVersion> {
        let mut leaves = self.store.leaves(&key.identity_hash()).await?;
        leaves.sort();

        let Some((first, rest)) = leaves.split_first() else {
            return Err(ChannelError::ChannelNotFound(key.clone()));
        };

        let mut current = load_head(&*self.store, first).await?;
        for leaf in rest {
            current = self.merge(&current.version, leaf).await?;
        }
        Ok(current)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chain Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge two chains and return the new head entry.
    ///
    /// If one chain is contained in the other, the longer chain's head is
    /// returned as is and nothing is written.
    pub async fn merge_chains(
        &self,
        left: Option<EntryId>,
        right: Option<EntryId>,
    ) -> Result<Option<EntryId>> {
        let divergence = self.diverge(left, right).await?;

        if divergence.right.is_empty() {
            return Ok(left);
        }
        if divergence.left.is_empty() {
            return Ok(right);
        }

        let combined = combine(divergence.left, divergence.right);

        let mut previous = divergence.ancestor;
        for node in combined.iter().rev() {
            let entry = Entry::new(node.entry.envelope, previous);
            self.store.put_immutable(&entry.to_canonical()).await?;
            previous = Some(entry.compute_id());
        }

        Ok(previous)
    }

    /// Split two chains at their lowest common ancestor.
    ///
    /// Both chains are walked one node per side per step. Since a shared node
    /// implies an identical older history, the first node seen on both sides
    /// is the lowest common ancestor and the walk stops there.
    pub async fn diverge(&self, left: Option<EntryId>, right: Option<EntryId>) -> Result<Divergence> {
        let mut left_walker = ChainWalker::new(Arc::clone(&self.store), left);
        let mut right_walker = ChainWalker::new(Arc::clone(&self.store), right);

        let mut left_nodes: Vec<ChainNode> = Vec::new();
        let mut right_nodes: Vec<ChainNode> = Vec::new();
        let mut left_seen: HashSet<EntryId> = HashSet::new();
        let mut right_seen: HashSet<EntryId> = HashSet::new();
        let mut ancestor = None;

        while !(left_walker.is_exhausted() && right_walker.is_exhausted()) {
            if let Some(node) = left_walker.next().await? {
                if right_seen.contains(&node.id) {
                    ancestor = Some(node.id);
                    break;
                }
                left_seen.insert(node.id);
                left_nodes.push(node);
            }

            if let Some(node) = right_walker.next().await? {
                if left_seen.contains(&node.id) {
                    ancestor = Some(node.id);
                    break;
                }
                right_seen.insert(node.id);
                right_nodes.push(node);
            }
        }

        // The side that did not detect the ancestor may have walked past it.
        if let Some(id) = ancestor {
            for nodes in [&mut left_nodes, &mut right_nodes] {
                if let Some(pos) = nodes.iter().position(|n| n.id == id) {
                    nodes.truncate(pos);
                }
            }
        }

        tracing::debug!(
            ancestor = ?ancestor,
            left = left_nodes.len(),
            right = right_nodes.len(),
            visited = left_walker.visited() + right_walker.visited(),
            "found divergence"
        );

        Ok(Divergence {
            ancestor,
            left: left_nodes,
            right: right_nodes,
        })
    }

    /// Whether `ancestor` is reachable from `descendant` through parent links.
    pub async fn is_version_ancestor(&self, ancestor: &VersionId, descendant: &VersionId) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }

        let mut queue = VecDeque::from([*descendant]);
        let mut seen = HashSet::from([*descendant]);

        while let Some(version) = queue.pop_front() {
            let object = self.store.require_versioned(&version).await?;
            for parent in object.parents {
                if parent == *ancestor {
                    return Ok(true);
                }
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }

        Ok(false)
    }
}

/// Union two divergent prefixes, newest first.
///
/// An envelope that occurs on both sides (the same payload at the same
/// timestamp, posted independently) is kept as many times as the side with
/// more copies has it, not the sum.
fn combine(left: Vec<ChainNode>, right: Vec<ChainNode>) -> Vec<ChainNode> {
    let mut left_counts: HashMap<ObjectHash, usize> = HashMap::new();
    for node in &left {
        *left_counts.entry(node.entry.envelope).or_default() += 1;
    }

    let mut combined = left;
    for node in right {
        match left_counts.get_mut(&node.entry.envelope) {
            Some(count) if *count > 0 => *count -= 1,
            _ => combined.push(node),
        }
    }

    // Equal order keys mean equal envelopes, so ties cannot reorder the result.
    combined.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::append::AppendEngine;
    use crate::chain::ChainWalker;
    use crate::clock::Clock;
    use chanlog_core::Payload;
    use chanlog_store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        append: AppendEngine<MemoryStore>,
        merge: MergeEngine<MemoryStore>,
        key: ChannelKey,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            Self {
                append: AppendEngine::new(store.clone(), Arc::new(Clock::default())),
                merge: MergeEngine::new(store.clone()),
                store,
                key: ChannelKey::new("merge", None),
            }
        }

        async fn post(&self, base: Option<&HeadVersion>, ts: i64) -> HeadVersion {
            let payload = Payload::bytes("n", ts.to_be_bytes().to_vec());
            self.append
                .append(&self.key, base, &payload, Some(ts))
                .await
                .unwrap()
        }

        async fn timestamps(&self, head: &HeadVersion) -> Vec<i64> {
            ChainWalker::new(self.store.clone(), head.head_entry)
                .collect()
                .await
                .unwrap()
                .iter()
                .map(|n| n.timestamp())
                .collect()
        }
    }

    #[tokio::test]
    async fn test_merge_interleaves_by_timestamp() {
        let f = Fixture::new();
        let base = f.post(None, 10).await;
        let left = f.post(Some(&f.post(Some(&base), 20).await), 40).await;
        let right = f.post(Some(&f.post(Some(&base), 30).await), 50).await;

        let merged = f.merge.merge(&left.version, &right.version).await.unwrap();
        assert_eq!(f.timestamps(&merged).await, vec![50, 40, 30, 20, 10]);
        assert_eq!(f.store.leaves(&f.key.identity_hash()).await.unwrap(), vec![merged.version]);
    }

    #[tokio::test]
    async fn test_merge_is_commutative() {
        let f = Fixture::new();
        let base = f.post(None, 1).await;
        let left = f.post(Some(&base), 2).await;
        let right = f.post(Some(&base), 3).await;

        let ab = f.merge.merge(&left.version, &right.version).await.unwrap();
        let ba = f.merge.merge(&right.version, &left.version).await.unwrap();
        assert_eq!(ab, ba);
    }

    #[tokio::test]
    async fn test_merge_with_self_and_ancestor() {
        let f = Fixture::new();
        let base = f.post(None, 1).await;
        let tip = f.post(Some(&f.post(Some(&base), 2).await), 3).await;

        assert_eq!(f.merge.merge(&tip.version, &tip.version).await.unwrap(), tip);
        assert_eq!(f.merge.merge(&tip.version, &base.version).await.unwrap(), tip);
        assert_eq!(f.merge.merge(&base.version, &tip.version).await.unwrap(), tip);
    }

    #[tokio::test]
    async fn test_identical_envelopes_collapse() {
        let f = Fixture::new();
        let base = f.post(None, 1).await;
        let three = f.post(Some(&base), 3).await;
        let left = f.post(Some(&f.post(Some(&three), 5).await), 6).await;
        let right = f.post(Some(&base), 5).await;
        assert_ne!(left.head_entry, right.head_entry);

        let merged = f.merge.merge(&left.version, &right.version).await.unwrap();
        assert_eq!(f.timestamps(&merged).await, vec![6, 5, 3, 1]);
        // Relinking the left chain reproduces it exactly.
        assert_eq!(merged.head_entry, left.head_entry);
        assert_ne!(merged.version, left.version);
    }

    #[tokio::test]
    async fn test_no_common_ancestor() {
        let f = Fixture::new();
        let left = f.post(Some(&f.post(None, 1).await), 4).await;
        let right = f.post(Some(&f.post(None, 2).await), 3).await;

        let divergence = f.merge.diverge(left.head_entry, right.head_entry).await.unwrap();
        assert!(divergence.ancestor.is_none());

        let merged = f.merge.merge(&left.version, &right.version).await.unwrap();
        assert_eq!(f.timestamps(&merged).await, vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_lca_on_uneven_branches() {
        let f = Fixture::new();
        let mut base = f.post(None, 1).await;
        for ts in 2..6 {
            base = f.post(Some(&base), ts).await;
        }
        let mut long = base.clone();
        for ts in 10..20 {
            long = f.post(Some(&long), ts).await;
        }
        let short = f.post(Some(&base), 7).await;

        let divergence = f.merge.diverge(long.head_entry, short.head_entry).await.unwrap();
        assert_eq!(divergence.ancestor, base.head_entry);
        assert_eq!(divergence.left.len(), 10);
        assert_eq!(divergence.right.len(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_channels() {
        let f = Fixture::new();
        let mine = f.post(None, 1).await;
        let other_key = ChannelKey::new("other", None);
        let theirs = f
            .append
            .append(&other_key, None, &Payload::bytes("n", vec![]), Some(1))
            .await
            .unwrap();

        let err = f.merge.merge(&mine.version, &theirs.version).await.unwrap_err();
        assert!(matches!(err, ChannelError::MismatchedChannels { .. }));
    }

    #[tokio::test]
    async fn test_merge_leaves() {
        let f = Fixture::new();
        let base = f.post(None, 1).await;
        f.post(Some(&base), 2).await;
        f.post(Some(&base), 3).await;
        f.post(Some(&base), 4).await;

        let merged = f.merge.merge_leaves(&f.key).await.unwrap();
        assert_eq!(f.timestamps(&merged).await, vec![4, 3, 2, 1]);
        assert_eq!(f.store.leaves(&f.key.identity_hash()).await.unwrap(), vec![merged.version]);
    }
}
