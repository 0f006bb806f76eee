//! Message payloads and their encoding
//!
//! A transport runs in one of two encoding modes. In raw mode bytes travel
//! untouched; in structured mode every payload is serialized with
//! `serde_json` before it is sent and deserialized after it arrives.
//!
//! There is no implicit conversion of arbitrary values to text. A caller
//! that wants the textual form of a value says so with [`Payload::text`].

use crate::error::PayloadError;
use crate::wire::WireRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How payloads are put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMode {
    /// Byte sequences and fixed records are sent as-is
    #[default]
    Raw,
    /// Every payload is serialized as JSON
    Structured,
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingMode::Raw => write!(f, "raw"),
            EncodingMode::Structured => write!(f, "structured"),
        }
    }
}

/// A message body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain bytes
    Bytes(Vec<u8>),
    /// A serializer value
    Structured(serde_json::Value),
    /// A fixed-layout record, already encoded
    FixedRecord(Vec<u8>),
}

impl Payload {
    /// Creates a byte payload
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Payload::Bytes(data.into())
    }

    /// Creates an empty byte payload
    pub fn empty() -> Self {
        Payload::Bytes(Vec::new())
    }

    /// Creates a structured payload from any serializable value
    pub fn structured<T: Serialize>(value: &T) -> Result<Self, PayloadError> {
        Ok(Payload::Structured(serde_json::to_value(value)?))
    }

    /// Creates a payload from a fixed-layout record
    pub fn record<R: WireRecord>(record: &R) -> Self {
        Payload::FixedRecord(record.to_bytes())
    }

    /// Creates a byte payload from the textual form of `value`
    pub fn text(value: impl fmt::Display) -> Self {
        Payload::Bytes(value.to_string().into_bytes())
    }

    /// Encodes the payload for the given mode
    ///
    /// Structured values are rejected in raw mode. In structured mode bytes
    /// and records are serialized as a JSON array of numbers.
    pub fn encode(&self, mode: EncodingMode) -> Result<Vec<u8>, PayloadError> {
        match (mode, self) {
            (EncodingMode::Raw, Payload::Bytes(data))
            | (EncodingMode::Raw, Payload::FixedRecord(data)) => Ok(data.clone()),
            (EncodingMode::Raw, Payload::Structured(_)) => Err(PayloadError::StructuredInRawMode),
            (EncodingMode::Structured, Payload::Structured(value)) => {
                Ok(serde_json::to_vec(value)?)
            }
            (EncodingMode::Structured, Payload::Bytes(data))
            | (EncodingMode::Structured, Payload::FixedRecord(data)) => {
                Ok(serde_json::to_vec(data)?)
            }
        }
    }

    /// Decodes received bytes for the given mode
    ///
    /// An empty structured body decodes to `null`.
    pub fn decode(bytes: &[u8], mode: EncodingMode) -> Result<Self, PayloadError> {
        match mode {
            EncodingMode::Raw => Ok(Payload::Bytes(bytes.to_vec())),
            EncodingMode::Structured if bytes.is_empty() => {
                Ok(Payload::Structured(serde_json::Value::Null))
            }
            EncodingMode::Structured => Ok(Payload::Structured(serde_json::from_slice(bytes)?)),
        }
    }

    /// Returns the raw bytes of a byte or record payload
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(data) | Payload::FixedRecord(data) => Some(data),
            Payload::Structured(_) => None,
        }
    }

    /// Returns the structured value, if any
    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Structured(value) => Some(value),
            _ => None,
        }
    }

    /// Deserializes a structured payload into `T`
    pub fn into_value<T: DeserializeOwned>(self) -> Result<T, PayloadError> {
        match self {
            Payload::Structured(value) => Ok(serde_json::from_value(value)?),
            _ => Err(PayloadError::NotStructured),
        }
    }

    /// Decodes a fixed record from a byte or record payload
    pub fn as_record<R: WireRecord>(&self) -> Result<R, PayloadError> {
        let bytes = self.as_bytes().ok_or(PayloadError::NotStructured)?;
        Ok(R::read_from(bytes)?)
    }

    /// True for an empty byte payload or a `null` value
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Bytes(data) | Payload::FixedRecord(data) => data.is_empty(),
            Payload::Structured(value) => value.is_null(),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Bytes(data)
    }
}

impl From<&[u8]> for Payload {
    fn from(data: &[u8]) -> Self {
        Payload::Bytes(data.to_vec())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Structured(value)
    }
}
