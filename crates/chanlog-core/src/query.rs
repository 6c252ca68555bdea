//! Query descriptions and query results.

use serde::{Deserialize, Serialize};

use crate::hash::{ObjectHash, OwnerId};
use crate::payload::ChannelObject;
use crate::types::{ChannelKey, EntryId};

/// Which owners a query covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerFilter {
    /// Every owner of the matched channel ids, ownerless channels included.
    #[default]
    Any,
    /// Only channels without an owner.
    Ownerless,
    /// Only channels owned by this owner.
    Owner(OwnerId),
}

impl OwnerFilter {
    pub fn matches(&self, owner: Option<&OwnerId>) -> bool {
        match (self, owner) {
            (OwnerFilter::Any, _) => true,
            (OwnerFilter::Ownerless, None) => true,
            (OwnerFilter::Owner(want), Some(have)) => want == have,
            _ => false,
        }
    }
}

impl From<Option<OwnerId>> for OwnerFilter {
    fn from(owner: Option<OwnerId>) -> Self {
        match owner {
            Some(owner) => OwnerFilter::Owner(owner),
            None => OwnerFilter::Ownerless,
        }
    }
}

/// Result order by timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    Ascending,
    /// Newest first.
    #[default]
    Descending,
}

/// A filtered, ordered query over channel objects.
///
/// Every field is optional; `Query::default()` matches every object of every
/// channel, newest first.
///
/// ```rust
/// use chanlog_core::{Order, Query};
///
/// let query = Query::new()
///     .channel("temps")
///     .with_type("Temperature")
///     .range(1_000, 2_000)
///     .count(10)
///     .order(Order::Ascending);
/// assert!(query.matches_timestamp(1_000));
/// assert!(!query.matches_timestamp(2_000));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// Restrict to one channel id. `None` = all channels.
    pub channel_id: Option<String>,
    pub owner: OwnerFilter,
    /// Payload type discriminator.
    pub type_name: Option<String>,
    /// Inclusive lower timestamp bound.
    pub from: Option<i64>,
    /// Exclusive upper timestamp bound.
    pub to: Option<i64>,
    /// Maximum number of yielded results.
    pub count: Option<usize>,
    pub order: Order,
}

impl Query {
    /// A query matching everything, newest first.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn owner(mut self, owner: OwnerId) -> Self {
        self.owner = OwnerFilter::Owner(owner);
        self
    }

    pub fn ownerless(mut self) -> Self {
        self.owner = OwnerFilter::Ownerless;
        self
    }

    pub fn owner_filter(mut self, filter: OwnerFilter) -> Self {
        self.owner = filter;
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Restrict to payloads of the given object type.
    pub fn of_type<T: ChannelObject>(self) -> Self {
        self.with_type(T::TYPE_NAME)
    }

    /// Inclusive lower bound.
    pub fn since(mut self, from: i64) -> Self {
        self.from = Some(from);
        self
    }

    /// Exclusive upper bound.
    pub fn until(mut self, to: i64) -> Self {
        self.to = Some(to);
        self
    }

    /// Half-open timestamp range `[from, to)`.
    pub fn range(self, from: i64, to: i64) -> Self {
        self.since(from).until(to)
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn ascending(self) -> Self {
        self.order(Order::Ascending)
    }

    pub fn descending(self) -> Self {
        self.order(Order::Descending)
    }

    /// Whether a channel falls under this query's channel and owner filters.
    pub fn matches_key(&self, key: &ChannelKey) -> bool {
        if let Some(channel_id) = &self.channel_id {
            if channel_id != &key.channel_id {
                return false;
            }
        }
        self.owner.matches(key.owner.as_ref())
    }

    /// Whether `timestamp` lies in `[from, to)`.
    pub fn matches_timestamp(&self, timestamp: i64) -> bool {
        self.from.map_or(true, |from| timestamp >= from) && self.to.map_or(true, |to| timestamp < to)
    }

    pub fn matches_type(&self, type_name: &str) -> bool {
        self.type_name.as_deref().map_or(true, |t| t == type_name)
    }

    /// Whether no object can possibly match, e.g. `count(0)` or an empty range.
    pub fn is_empty(&self) -> bool {
        if self.count == Some(0) {
            return true;
        }
        matches!((self.from, self.to), (Some(from), Some(to)) if from >= to)
    }
}

/// One query result: a payload plus where and when it was logged.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectData<P> {
    pub channel_id: String,
    pub owner: Option<OwnerId>,
    pub timestamp: i64,
    /// Stable identity of the entry, usable for point lookups.
    pub id: EntryId,
    pub payload_hash: ObjectHash,
    pub data: P,
}

impl<P> ObjectData<P> {
    pub fn key(&self) -> ChannelKey {
        ChannelKey::new(self.channel_id.clone(), self.owner)
    }

    /// Replace the payload, keeping the metadata.
    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> ObjectData<Q> {
        ObjectData {
            channel_id: self.channel_id,
            owner: self.owner,
            timestamp: self.timestamp,
            id: self.id,
            payload_hash: self.payload_hash,
            data: f(self.data),
        }
    }

    /// Fallible version of [`ObjectData::map`].
    pub fn try_map<Q, E>(self, f: impl FnOnce(P) -> Result<Q, E>) -> Result<ObjectData<Q>, E> {
        let data = f(self.data)?;
        Ok(ObjectData {
            channel_id: self.channel_id,
            owner: self.owner,
            timestamp: self.timestamp,
            id: self.id,
            payload_hash: self.payload_hash,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_everything() {
        let query = Query::new();
        assert_eq!(query.order, Order::Descending);
        assert!(query.matches_key(&ChannelKey::new("x", None)));
        assert!(query.matches_key(&ChannelKey::new("x", Some(OwnerId::from_bytes([1; 32])))));
        assert!(query.matches_timestamp(i64::MIN));
        assert!(query.matches_type("Anything"));
        assert!(!query.is_empty());
    }

    #[test]
    fn test_owner_filter() {
        let alice = OwnerId::derive("alice");
        let bob = OwnerId::derive("bob");

        assert!(OwnerFilter::Owner(alice).matches(Some(&alice)));
        assert!(!OwnerFilter::Owner(alice).matches(Some(&bob)));
        assert!(!OwnerFilter::Owner(alice).matches(None));
        assert!(OwnerFilter::Ownerless.matches(None));
        assert!(!OwnerFilter::Ownerless.matches(Some(&alice)));
        assert_eq!(OwnerFilter::from(None), OwnerFilter::Ownerless);
    }

    #[test]
    fn test_channel_filter() {
        let query = Query::new().channel("first");
        assert!(query.matches_key(&ChannelKey::new("first", None)));
        assert!(!query.matches_key(&ChannelKey::new("second", None)));
    }

    #[test]
    fn test_half_open_range() {
        let query = Query::new().range(10, 20);
        assert!(!query.matches_timestamp(9));
        assert!(query.matches_timestamp(10));
        assert!(query.matches_timestamp(19));
        assert!(!query.matches_timestamp(20));
    }

    #[test]
    fn test_empty_queries() {
        assert!(Query::new().count(0).is_empty());
        assert!(Query::new().range(5, 5).is_empty());
        assert!(!Query::new().range(5, 6).is_empty());
    }

    #[test]
    fn test_object_data_map() {
        let item = ObjectData {
            channel_id: "c".into(),
            owner: None,
            timestamp: 7,
            id: EntryId::from_bytes([1; 32]),
            payload_hash: ObjectHash::ZERO,
            data: 2,
        };
        let mapped = item.map(|n| n * 10);
        assert_eq!(mapped.data, 20);
        assert_eq!(mapped.timestamp, 7);
        assert_eq!(mapped.key(), ChannelKey::new("c", None));
    }
}
