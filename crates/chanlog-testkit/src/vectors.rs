//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical bytes of every object kind the channel
//! engine hashes. Two builds that disagree on any of them would compute
//! different ids for the same entries and could never merge each other's
//! chains.

use serde::Serialize;

use chanlog_core::{
    identity_bytes, ChannelKey, Entry, EntryId, Envelope, Head, ObjectHash, OwnerId, Payload,
    Value,
};

/// Inputs of one vector. Hashes are fixed byte patterns, not computed.
#[derive(Debug, Clone, Serialize)]
pub enum VectorInput {
    Envelope {
        timestamp: i64,
        payload: [u8; 32],
    },
    Entry {
        envelope: [u8; 32],
        previous: Option<[u8; 32]>,
    },
    BytesPayload {
        type_name: &'static str,
        body: &'static [u8],
    },
    /// A `{"reading": value}` body, as serde produces for a one-field struct.
    ReadingPayload {
        type_name: &'static str,
        reading: i64,
    },
    Identity {
        channel_id: &'static str,
        owner: Option<[u8; 32]>,
    },
    Head {
        channel_id: &'static str,
        owner: Option<[u8; 32]>,
        head_entry: Option<[u8; 32]>,
    },
}

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub input: VectorInput,
    /// Expected canonical bytes (hex).
    pub expected_hex: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "envelope with millisecond timestamp",
            input: VectorInput::Envelope {
                timestamp: 1736870400000, // 2025-01-14T16:00:00Z
                payload: [0x11; 32],
            },
            expected_hex: "a30002011b00000194658b1000025820\
                           1111111111111111111111111111111111111111111111111111111111111111",
        },
        GoldenVector {
            name: "envelope with negative timestamp",
            input: VectorInput::Envelope {
                timestamp: -1,
                payload: [0x00; 32],
            },
            expected_hex: "a300020120025820\
                           0000000000000000000000000000000000000000000000000000000000000000",
        },
        GoldenVector {
            name: "first entry of a chain",
            input: VectorInput::Entry {
                envelope: [0x22; 32],
                previous: None,
            },
            expected_hex: "a3000301582022222222222222222222222222222222\
                           2222222222222222222222222222222202f6",
        },
        GoldenVector {
            name: "linked entry",
            input: VectorInput::Entry {
                envelope: [0x22; 32],
                previous: Some([0x33; 32]),
            },
            expected_hex: "a3000301582022222222222222222222222222222222\
                           22222222222222222222222222222222025820\
                           3333333333333333333333333333333333333333333333333333333333333333",
        },
        GoldenVector {
            name: "opaque bytes payload",
            input: VectorInput::BytesPayload {
                type_name: "Temperature",
                body: b"hello",
            },
            expected_hex: "a30001016b54656d7065726174757265024568656c6c6f",
        },
        GoldenVector {
            name: "structured payload",
            input: VectorInput::ReadingPayload {
                type_name: "Temperature",
                reading: 21,
            },
            expected_hex: "a30001016b54656d706572617475726502a16772656164696e6715",
        },
        GoldenVector {
            name: "ownerless channel identity",
            input: VectorInput::Identity {
                channel_id: "temps",
                owner: None,
            },
            expected_hex: "a30007016574656d707302f6",
        },
        GoldenVector {
            name: "owned channel identity",
            input: VectorInput::Identity {
                channel_id: "temps",
                owner: Some([0x55; 32]),
            },
            expected_hex: "a30007016574656d7073025820\
                           5555555555555555555555555555555555555555555555555555555555555555",
        },
        GoldenVector {
            name: "head of a non-empty channel",
            input: VectorInput::Head {
                channel_id: "temps",
                owner: None,
                head_entry: Some([0x44; 32]),
            },
            expected_hex: "a40004016574656d707302f6035820\
                           4444444444444444444444444444444444444444444444444444444444444444",
        },
        GoldenVector {
            name: "head of an empty channel",
            input: VectorInput::Head {
                channel_id: "temps",
                owner: None,
                head_entry: None,
            },
            expected_hex: "a40004016574656d707302f603f6",
        },
    ]
}

/// Encode the object a vector describes.
pub fn encode_vector(vector: &GoldenVector) -> Vec<u8> {
    match &vector.input {
        VectorInput::Envelope { timestamp, payload } => {
            Envelope::new(*timestamp, ObjectHash::from_bytes(*payload)).to_canonical()
        }
        VectorInput::Entry { envelope, previous } => Entry::new(
            ObjectHash::from_bytes(*envelope),
            previous.map(EntryId::from_bytes),
        )
        .to_canonical(),
        VectorInput::BytesPayload { type_name, body } => {
            payload_bytes(Payload::bytes(*type_name, body.to_vec()))
        }
        VectorInput::ReadingPayload { type_name, reading } => {
            let body = Value::Map(vec![(
                Value::Text("reading".into()),
                Value::Integer((*reading).into()),
            )]);
            payload_bytes(Payload::new(*type_name, body))
        }
        VectorInput::Identity { channel_id, owner } => identity_bytes(&key(channel_id, owner)),
        VectorInput::Head {
            channel_id,
            owner,
            head_entry,
        } => {
            let key = key(channel_id, owner);
            let head = match head_entry {
                Some(entry) => Head::at(&key, EntryId::from_bytes(*entry)),
                None => Head::empty(&key),
            };
            head.to_canonical()
        }
    }
}

fn key(channel_id: &str, owner: &Option<[u8; 32]>) -> ChannelKey {
    ChannelKey::new(channel_id, owner.map(OwnerId::from_bytes))
}

fn payload_bytes(payload: Payload) -> Vec<u8> {
    // Byte and single-entry map bodies always encode.
    payload.to_canonical().unwrap_or_default()
}

/// Check every vector against the current encoder.
///
/// Returns `(name, matches, actual_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let hex = hex::encode(encode_vector(v));
            (v.name.to_string(), hex == v.expected_hex, hex)
        })
        .collect()
}

/// One exported vector, with the id its bytes hash to.
#[derive(Debug, Serialize)]
struct ExportedVector<'a> {
    #[serde(flatten)]
    vector: &'a GoldenVector,
    hash: String,
}

/// Export all vectors as JSON, for checking other implementations.
pub fn export_json() -> serde_json::Result<String> {
    let vectors = all_vectors();
    let exported: Vec<ExportedVector<'_>> = vectors
        .iter()
        .map(|vector| ExportedVector {
            vector,
            hash: ObjectHash::hash(&encode_vector(vector)).to_hex(),
        })
        .collect();
    serde_json::to_string_pretty(&exported)
}
