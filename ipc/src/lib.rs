//! # Message-passing wire types
//!
//! This crate defines everything that travels between a client and a server
//! over a channel: pulses, event descriptors, sender information, the fixed
//! headers resource managers speak, and the payload encoding policy.
//!
//! ## Philosophy
//!
//! - **Bit-exact layouts**: every fixed record encodes to the same bytes on
//!   every host (little-endian, explicit padding)
//! - **Explicit payloads**: bytes, structured values and fixed records are
//!   distinct variants; nothing is silently converted to text
//! - **Grow, never shrink**: buffers only grow so in-flight bytes survive
//!
//! ## Architecture
//!
//! A send carries an encoded [`Payload`]. The receiver gets a receive id,
//! a [`MsgInfo`] describing the sender, and the bytes that fit its
//! [`MessageBuffer`]. A receive id of zero means the bytes are a [`Pulse`].
//! Resource-manager requests start with a `u16` type that selects between a
//! [`ConnectMessage`] and one of the io headers.

pub mod buffer;
pub mod error;
pub mod event;
pub mod header;
pub mod info;
pub mod payload;
pub mod pulse;
pub mod stat;
pub mod wire;

pub use buffer::MessageBuffer;
pub use error::{PayloadError, WireError};
pub use event::{SigEvent, DEFAULT_PULSE_PRIORITY, SIGEV_INTR, SIGEV_PULSE, SIGEV_UNBLOCK};
pub use header::{
    connect_subtype, msg_type, peek_type, whence, CloseHeader, ConnectHeader, ConnectMessage,
    DevctlHeader, IoHeader, LseekHeader, StatHeader, COMBINE_FLAG,
};
pub use info::MsgInfo;
pub use payload::{EncodingMode, Payload};
pub use pulse::{code as pulse_code, Pulse, PulseKind, SigVal};
pub use stat::StatRecord;
pub use wire::WireRecord;
