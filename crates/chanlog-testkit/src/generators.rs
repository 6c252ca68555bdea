//! Proptest generators for property-based testing.

use proptest::prelude::*;

use chanlog_core::{ChannelKey, Envelope, ObjectHash, OwnerId, Payload, Query};

/// Generate a random ObjectHash.
pub fn object_hash() -> impl Strategy<Value = ObjectHash> {
    any::<[u8; 32]>().prop_map(ObjectHash::from_bytes)
}

/// Generate a random OwnerId.
pub fn owner_id() -> impl Strategy<Value = OwnerId> {
    any::<[u8; 32]>().prop_map(OwnerId::from_bytes)
}

/// Generate a timestamp, negative ones included.
pub fn timestamp() -> impl Strategy<Value = i64> {
    -1_000i64..=1_800_000_000_000i64
}

/// Generate a channel name.
pub fn channel_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

/// Generate a channel key.
pub fn channel_key() -> impl Strategy<Value = ChannelKey> {
    (channel_id(), proptest::option::of(owner_id()))
        .prop_map(|(id, owner)| ChannelKey::new(id, owner))
}

/// Generate an opaque payload of at most `max_len` bytes.
pub fn payload(max_len: usize) -> impl Strategy<Value = Payload> {
    (
        prop_oneof![Just("a"), Just("b"), Just("c")],
        prop::collection::vec(any::<u8>(), 0..=max_len),
    )
        .prop_map(|(type_name, body)| Payload::bytes(type_name, body))
}

pub fn envelope() -> impl Strategy<Value = Envelope> {
    (timestamp(), object_hash()).prop_map(|(ts, hash)| Envelope::new(ts, hash))
}

/// One post of a generated scenario.
///
/// Channels and owners are small indexes so that scenarios revisit the same
/// channels often.
#[derive(Debug, Clone)]
pub struct PostParams {
    pub channel: usize,
    pub owner: Option<usize>,
    pub timestamp: i64,
    pub type_name: &'static str,
    pub body: u8,
}

impl PostParams {
    pub fn channel_id(&self) -> String {
        format!("ch{}", self.channel)
    }

    pub fn payload(&self) -> Payload {
        Payload::bytes(self.type_name, vec![self.body])
    }
}

impl Arbitrary for PostParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            0usize..2,
            proptest::option::of(0usize..3),
            0i64..40,
            prop_oneof![Just("x"), Just("y")],
            any::<u8>(),
        )
            .prop_map(|(channel, owner, timestamp, type_name, body)| PostParams {
                channel,
                owner,
                timestamp,
                type_name,
                body,
            })
            .boxed()
    }
}

/// A fork of one channel: shared posts, then two independent branches.
///
/// Branch timestamps all lie after the shared ones and every body is tagged
/// with its branch, so no two posts share an envelope.
#[derive(Debug, Clone)]
pub struct ForkParams {
    pub shared: Vec<i64>,
    pub left: Vec<i64>,
    pub right: Vec<i64>,
}

impl ForkParams {
    pub fn total(&self) -> usize {
        self.shared.len() + self.left.len() + self.right.len()
    }
}

impl Arbitrary for ForkParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        let sorted = |range: std::ops::Range<i64>, max: usize| {
            prop::collection::vec(range, 0..=max).prop_map(|mut v| {
                v.sort_unstable();
                v
            })
        };
        (
            sorted(0..1_000, 4),
            sorted(1_000..2_000, 6),
            sorted(1_000..2_000, 6),
        )
            .prop_map(|(shared, left, right)| ForkParams {
                shared,
                left,
                right,
            })
            .boxed()
    }
}

/// Generate a query over the channels and owners [`PostParams`] produces.
pub fn scenario_query(owners: Vec<OwnerId>) -> impl Strategy<Value = Query> {
    (
        proptest::option::of(0usize..2),
        proptest::option::of(proptest::option::of(0usize..3)),
        proptest::option::of(prop_oneof![Just("x"), Just("y")]),
        proptest::option::of(0usize..30),
        any::<bool>(),
    )
        .prop_map(move |(channel, owner, type_name, count, ascending)| {
            let mut query = Query::new();
            if let Some(channel) = channel {
                query = query.channel(format!("ch{channel}"));
            }
            if let Some(owner) = owner {
                query = query.owner_filter(owner.map(|i| owners[i]).into());
            }
            if let Some(type_name) = type_name {
                query = query.with_type(type_name);
            }
            if let Some(count) = count {
                query = query.count(count);
            }
            if ascending {
                query = query.ascending();
            }
            query
        })
}
