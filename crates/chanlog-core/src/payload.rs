//! Payloads: the opaque, typed content posted to channels.
//!
//! The channel engine never interprets a payload body. It only reads the type
//! discriminator so queries can filter by it.

use ciborium::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::canonical::{begin_object, decode_value, encode_text, encode_value, key, Fields, ObjectType};
use crate::error::{CoreError, Result};
use crate::hash::ObjectHash;

/// A domain object that can be posted to a channel.
///
/// ```rust
/// use chanlog_core::ChannelObject;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Temperature {
///     celsius: i64,
/// }
///
/// impl ChannelObject for Temperature {
///     const TYPE_NAME: &'static str = "Temperature";
/// }
/// ```
pub trait ChannelObject: Serialize + DeserializeOwned + Send + 'static {
    /// Discriminator stored alongside the serialized body.
    const TYPE_NAME: &'static str;
}

/// A typed, opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Discriminator used by type-filtered queries.
    pub type_name: String,
    /// The payload body as a CBOR data model value.
    pub body: Value,
}

impl Payload {
    /// Create a payload from a type name and a CBOR body.
    pub fn new(type_name: impl Into<String>, body: Value) -> Self {
        Self {
            type_name: type_name.into(),
            body,
        }
    }

    /// Create a payload carrying raw bytes.
    pub fn bytes(type_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(type_name, Value::Bytes(bytes.into()))
    }

    /// Serialize a typed domain object into a payload.
    pub fn from_object<T: ChannelObject>(object: &T) -> Result<Self> {
        let body =
            Value::serialized(object).map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(Self::new(T::TYPE_NAME, body))
    }

    /// Check whether this payload carries objects of type `T`.
    pub fn is<T: ChannelObject>(&self) -> bool {
        self.type_name == T::TYPE_NAME
    }

    /// Deserialize the body into a typed domain object.
    ///
    /// Fails with [`CoreError::PayloadTypeMismatch`] if the discriminator does
    /// not match `T::TYPE_NAME`.
    pub fn decode<T: ChannelObject>(&self) -> Result<T> {
        if !self.is::<T>() {
            return Err(CoreError::PayloadTypeMismatch {
                expected: T::TYPE_NAME.to_string(),
                found: self.type_name.clone(),
            });
        }
        self.body
            .deserialized()
            .map_err(|e| CoreError::DecodingError(e.to_string()))
    }

    /// Encode to canonical bytes.
    ///
    /// Format: `{0: 1, 1: type_name, 2: body}`
    pub fn to_canonical(&self) -> Result<Vec<u8>> {
        let body = encode_value(&self.body)?;
        let mut buf = Vec::with_capacity(8 + self.type_name.len() + body.len());
        begin_object(&mut buf, ObjectType::Payload, 2);
        key(&mut buf, 1);
        encode_text(&mut buf, &self.type_name);
        key(&mut buf, 2);
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Decode from canonical bytes.
    pub fn from_canonical(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        let fields = Fields::open(&value, ObjectType::Payload)?;
        Ok(Self {
            type_name: fields.text(1)?,
            body: fields.value(2)?.clone(),
        })
    }

    /// Content hash of the canonical encoding.
    pub fn content_hash(&self) -> Result<ObjectHash> {
        Ok(ObjectHash::hash(&self.to_canonical()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        value: i64,
    }

    impl ChannelObject for Reading {
        const TYPE_NAME: &'static str = "Reading";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Message {
        text: String,
    }

    impl ChannelObject for Message {
        const TYPE_NAME: &'static str = "Message";
    }

    #[test]
    fn test_typed_roundtrip() {
        let reading = Reading {
            sensor: "kitchen".into(),
            value: 21,
        };
        let payload = Payload::from_object(&reading).unwrap();
        assert!(payload.is::<Reading>());

        let bytes = payload.to_canonical().unwrap();
        let decoded = Payload::from_canonical(&bytes).unwrap();
        assert_eq!(decoded.type_name, "Reading");
        assert_eq!(decoded.to_canonical().unwrap(), bytes);
        assert_eq!(decoded.decode::<Reading>().unwrap(), reading);
    }

    #[test]
    fn test_decode_wrong_type() {
        let payload = Payload::from_object(&Message { text: "hi".into() }).unwrap();
        let err = payload.decode::<Reading>().unwrap_err();
        assert!(matches!(err, CoreError::PayloadTypeMismatch { .. }));
    }

    #[test]
    fn test_identical_content_identical_hash() {
        let a = Payload::from_object(&Reading { sensor: "a".into(), value: 1 }).unwrap();
        let b = Payload::from_object(&Reading { sensor: "a".into(), value: 1 }).unwrap();
        let c = Payload::from_object(&Reading { sensor: "a".into(), value: 2 }).unwrap();
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
        assert_ne!(a.content_hash().unwrap(), c.content_hash().unwrap());
    }

    #[test]
    fn test_struct_field_order_is_canonical() {
        // The same logical map written with different key orders hashes equally.
        let one = Payload::new(
            "Pair",
            Value::Map(vec![
                (Value::Text("x".into()), Value::Integer(1.into())),
                (Value::Text("y".into()), Value::Integer(2.into())),
            ]),
        );
        let two = Payload::new(
            "Pair",
            Value::Map(vec![
                (Value::Text("y".into()), Value::Integer(2.into())),
                (Value::Text("x".into()), Value::Integer(1.into())),
            ]),
        );
        assert_eq!(one.content_hash().unwrap(), two.content_hash().unwrap());
    }

    #[test]
    fn test_raw_bytes_payload() {
        let payload = Payload::bytes("blob", b"hello".to_vec());
        let bytes = payload.to_canonical().unwrap();
        // a3 00 01 01 64 "blob" 02 45 "hello"
        assert_eq!(&bytes[..5], &[0xa3, 0x00, 0x01, 0x01, 0x64]);
        assert_eq!(bytes.len(), 5 + 4 + 2 + 5);
        assert_eq!(Payload::from_canonical(&bytes).unwrap(), payload);
    }
}
