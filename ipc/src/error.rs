//! Wire and payload error types

use thiserror::Error;

/// Errors encoding or decoding a fixed wire layout
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes than the layout requires
    #[error("message truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// The type field does not match the expected message family
    #[error("unexpected message type {found:#x}, expected {expected}")]
    UnexpectedType { expected: &'static str, found: u16 },

    /// A path field was not valid UTF-8
    #[error("path is not valid UTF-8")]
    InvalidPath,

    /// Unknown discriminator in the pulse value slot
    #[error("unknown pulse value tag {0}")]
    BadValueTag(u8),

    /// A variable part is longer than its 16-bit length field can hold
    #[error("{field} of {len} bytes exceeds {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Errors encoding or decoding a payload
#[derive(Debug, Error)]
pub enum PayloadError {
    /// A structured value was handed to a raw-mode transport
    #[error("structured payload cannot be sent in raw mode")]
    StructuredInRawMode,

    /// The serializer rejected the value or the bytes
    #[error("serializer error: {0}")]
    Serializer(#[from] serde_json::Error),

    /// The payload does not hold a structured value
    #[error("payload is not structured")]
    NotStructured,

    /// A fixed record failed to decode
    #[error(transparent)]
    Wire(#[from] WireError),
}
