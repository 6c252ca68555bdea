//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - Floats always encoded as 8-byte IEEE 754
//!
//! Every stored object is a map with small integer keys. Key 0 always holds the
//! [`ObjectType`] code, so the bytes of an envelope can never be mistaken for
//! the bytes of an entry even though both live in the same object store.

use ciborium::value::Value;

use crate::error::CoreError;
use crate::types::ChannelKey;

/// Discriminator stored under key 0 of every canonical object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
    Payload = 1,
    Envelope = 2,
    Entry = 3,
    Head = 4,
    VersionNode = 5,
    RegistrySnapshot = 6,
    ChannelIdentity = 7,
}

impl ObjectType {
    /// Convert to the wire code.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Try to parse from the wire code.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Payload),
            2 => Some(Self::Envelope),
            3 => Some(Self::Entry),
            4 => Some(Self::Head),
            5 => Some(Self::VersionNode),
            6 => Some(Self::RegistrySnapshot),
            7 => Some(Self::ChannelIdentity),
            _ => None,
        }
    }
}

/// Key of the object type field.
pub(crate) const TYPE_KEY: u64 = 0;

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Encode an arbitrary CBOR value canonically.
///
/// Used for payload bodies, which are caller-supplied and may contain any
/// CBOR data model value.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Start a canonical object: map header plus the type field.
///
/// `fields` is the number of fields after the type field. Callers must then
/// write keys `1..=fields` in ascending order.
pub(crate) fn begin_object(buf: &mut Vec<u8>, kind: ObjectType, fields: u64) {
    encode_uint(buf, 5, fields + 1);
    encode_uint(buf, 0, TYPE_KEY);
    encode_uint(buf, 0, kind.code());
}

/// Write an integer map key.
pub(crate) fn key(buf: &mut Vec<u8>, k: u64) {
    encode_uint(buf, 0, k);
}

/// Encode a signed integer (major types 0 and 1).
pub(crate) fn encode_i64(buf: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an optional 32-byte hash as bytes or null.
pub(crate) fn encode_opt_hash(buf: &mut Vec<u8>, hash: Option<&[u8; 32]>) {
    match hash {
        Some(h) => encode_bytes(buf, h),
        None => buf.push(0xf6),
    }
}

/// Encode the identity object of a channel.
///
/// Format: `{0: 7, 1: channel_id, 2: owner | null}`
pub fn identity_bytes(channel: &ChannelKey) -> Vec<u8> {
    let mut buf = Vec::with_capacity(48 + channel.channel_id.len());
    begin_object(&mut buf, ObjectType::ChannelIdentity, 2);
    key(&mut buf, 1);
    encode_text(&mut buf, &channel.channel_id);
    key(&mut buf, 2);
    encode_opt_hash(&mut buf, channel.owner.as_ref().map(|o| o.as_bytes()));
    buf
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner)?;
        }
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(f) => {
            buf.push(0xfb);
            buf.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        _ => {
            return Err(CoreError::EncodingError(
                "unsupported CBOR value type".into(),
            ))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
pub(crate) fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
pub(crate) fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
pub(crate) fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(CoreError::EncodingError("duplicate map key".into()));
    }

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Parse canonical bytes into a CBOR value.
pub fn decode_value(bytes: &[u8]) -> Result<Value, CoreError> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

/// Typed accessor over the fields of a decoded canonical object.
pub(crate) struct Fields<'a> {
    entries: &'a [(Value, Value)],
    kind: ObjectType,
}

impl<'a> Fields<'a> {
    /// Check that `value` is a map whose type field equals `expected`.
    pub(crate) fn open(value: &'a Value, expected: ObjectType) -> Result<Self, CoreError> {
        let entries = match value {
            Value::Map(m) => m.as_slice(),
            _ => return Err(CoreError::MalformedObject("expected map".into())),
        };

        let fields = Self {
            entries,
            kind: expected,
        };

        let code = fields.uint(TYPE_KEY)?;
        match ObjectType::from_code(code) {
            Some(found) if found == expected => Ok(fields),
            Some(found) => Err(CoreError::UnexpectedObjectType { expected, found }),
            None => Err(CoreError::MalformedObject(format!(
                "unknown object type code {}",
                code
            ))),
        }
    }

    fn get(&self, k: u64) -> Option<&'a Value> {
        self.entries
            .iter()
            .find(|(key, _)| matches!(key, Value::Integer(i) if i128::from(*i) == k as i128))
            .map(|(_, v)| v)
    }

    fn missing(&self, k: u64) -> CoreError {
        CoreError::MalformedObject(format!("{:?} field {} missing or invalid", self.kind, k))
    }

    pub(crate) fn value(&self, k: u64) -> Result<&'a Value, CoreError> {
        self.get(k).ok_or_else(|| self.missing(k))
    }

    pub(crate) fn uint(&self, k: u64) -> Result<u64, CoreError> {
        match self.get(k) {
            Some(Value::Integer(i)) => u64::try_from(i128::from(*i)).map_err(|_| self.missing(k)),
            _ => Err(self.missing(k)),
        }
    }

    pub(crate) fn int(&self, k: u64) -> Result<i64, CoreError> {
        match self.get(k) {
            Some(Value::Integer(i)) => i64::try_from(i128::from(*i)).map_err(|_| self.missing(k)),
            _ => Err(self.missing(k)),
        }
    }

    pub(crate) fn text(&self, k: u64) -> Result<String, CoreError> {
        match self.get(k) {
            Some(Value::Text(s)) => Ok(s.clone()),
            _ => Err(self.missing(k)),
        }
    }

    pub(crate) fn hash(&self, k: u64) -> Result<[u8; 32], CoreError> {
        match self.get(k) {
            Some(v) => hash_from_value(v).ok_or_else(|| self.missing(k)),
            None => Err(self.missing(k)),
        }
    }

    pub(crate) fn opt_hash(&self, k: u64) -> Result<Option<[u8; 32]>, CoreError> {
        match self.get(k) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => hash_from_value(v).map(Some).ok_or_else(|| self.missing(k)),
        }
    }

    pub(crate) fn array(&self, k: u64) -> Result<&'a [Value], CoreError> {
        match self.get(k) {
            Some(Value::Array(arr)) => Ok(arr.as_slice()),
            _ => Err(self.missing(k)),
        }
    }
}

/// Extract a 32-byte hash from a CBOR byte string.
pub(crate) fn hash_from_value(value: &Value) -> Option<[u8; 32]> {
    match value {
        Value::Bytes(b) if b.len() == 32 => {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(b);
            Some(arr)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::OwnerId;

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 1000);
        assert_eq!(buf, vec![0x19, 0x03, 0xe8]);

        buf.clear();
        encode_i64(&mut buf, -1);
        assert_eq!(buf, vec![0x20]);
    }

    #[test]
    fn test_map_keys_sorted() {
        let value = Value::Map(vec![
            (Value::Text("b".into()), Value::Integer(2.into())),
            (Value::Text("a".into()), Value::Integer(1.into())),
        ]);
        let bytes = encode_value(&value).unwrap();
        // a2 61 61 01 61 62 02
        assert_eq!(bytes, vec![0xa2, 0x61, 0x61, 0x01, 0x61, 0x62, 0x02]);
    }

    #[test]
    fn test_duplicate_map_keys_rejected() {
        let value = Value::Map(vec![
            (Value::Integer(1.into()), Value::Null),
            (Value::Integer(1.into()), Value::Bool(true)),
        ]);
        assert!(encode_value(&value).is_err());
    }

    #[test]
    fn test_float_is_always_eight_bytes() {
        let bytes = encode_value(&Value::Float(1.5)).unwrap();
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], 0xfb);
    }

    #[test]
    fn test_identity_bytes_shape() {
        let key = ChannelKey::new("t", None);
        // a3 00 07 01 61 74 02 f6
        assert_eq!(
            identity_bytes(&key),
            vec![0xa3, 0x00, 0x07, 0x01, 0x61, 0x74, 0x02, 0xf6]
        );

        let owned = ChannelKey::new("t", Some(OwnerId::from_bytes([7; 32])));
        assert_eq!(identity_bytes(&owned).len(), 6 + 2 + 32);
    }

    #[test]
    fn test_fields_rejects_wrong_type() {
        let bytes = identity_bytes(&ChannelKey::new("t", None));
        let value = decode_value(&bytes).unwrap();
        let err = Fields::open(&value, ObjectType::Entry).err().unwrap();
        assert!(matches!(
            err,
            CoreError::UnexpectedObjectType {
                expected: ObjectType::Entry,
                found: ObjectType::ChannelIdentity
            }
        ));
    }
}
