//! Pulses: fixed-size one-way notifications
//!
//! A pulse arrives through the same receive call as a message, with a
//! receive id of zero. Negative codes are reserved for the kernel; user
//! code picks codes in `MIN_AVAILABLE..=MAX_AVAILABLE`.
//!
//! Layout (24 bytes, little-endian):
//!
//! | offset | field |
//! |---|---|
//! | 0 | `i16` type |
//! | 2 | `i16` subtype |
//! | 4 | `i8` code |
//! | 5 | `u8` value tag (0 = int, 1 = pointer) |
//! | 6 | 2 bytes zero |
//! | 8 | `u64` value |
//! | 16 | `i32` scoid |
//! | 20 | 4 bytes zero |

use crate::error::WireError;
use crate::wire::{self, WireRecord};
use core_types::ServerConnectionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pulse codes reserved by the kernel and the user range
pub mod code {
    /// A blocked client asked to be unblocked
    pub const UNBLOCK: i8 = -32;
    /// A client connection went away
    pub const DISCONNECT: i8 = -33;
    /// A thread on the channel died
    pub const THREAD_DEATH: i8 = -34;
    /// A connection id died
    pub const COID_DEATH: i8 = -35;
    /// Lowest user pulse code
    pub const MIN_AVAILABLE: i8 = 0;
    /// Highest user pulse code
    pub const MAX_AVAILABLE: i8 = 127;
}

/// Type field of every pulse
pub const PULSE_TYPE: i16 = 0;
/// Subtype field of every pulse
pub const PULSE_SUBTYPE: i16 = 0;

const TAG_INT: u8 = 0;
const TAG_PTR: u8 = 1;

/// Value carried by a pulse or event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigVal {
    /// Small integer
    Int(i32),
    /// Opaque pointer-sized value
    Ptr(u64),
}

impl SigVal {
    /// Integer view; pointer values are truncated like the C union
    pub fn as_int(&self) -> i32 {
        match self {
            SigVal::Int(v) => *v,
            SigVal::Ptr(p) => *p as i32,
        }
    }

    /// Pointer-sized view
    pub fn as_ptr(&self) -> u64 {
        match self {
            SigVal::Int(v) => *v as u32 as u64,
            SigVal::Ptr(p) => *p,
        }
    }
}

impl Default for SigVal {
    fn default() -> Self {
        SigVal::Int(0)
    }
}

impl fmt::Display for SigVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigVal::Int(v) => write!(f, "int {}", v),
            SigVal::Ptr(p) => write!(f, "ptr {:#x}", p),
        }
    }
}

/// Classification of a pulse by its code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseKind {
    Unblock,
    Disconnect,
    ThreadDeath,
    ConnectionDeath,
    /// Another negative code reserved for the system
    System(i8),
    /// A user pulse
    User(i8),
}

/// A received or sent pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pulse {
    pub pulse_type: i16,
    pub subtype: i16,
    pub code: i8,
    pub value: SigVal,
    /// Server connection the pulse arrived on
    pub scoid: ServerConnectionId,
}

impl Pulse {
    /// Creates a pulse with the standard type and subtype
    pub fn new(code: i8, value: SigVal, scoid: ServerConnectionId) -> Self {
        Self {
            pulse_type: PULSE_TYPE,
            subtype: PULSE_SUBTYPE,
            code,
            value,
            scoid,
        }
    }

    /// Classifies this pulse by code
    pub fn kind(&self) -> PulseKind {
        match self.code {
            code::UNBLOCK => PulseKind::Unblock,
            code::DISCONNECT => PulseKind::Disconnect,
            code::THREAD_DEATH => PulseKind::ThreadDeath,
            code::COID_DEATH => PulseKind::ConnectionDeath,
            c if c < 0 => PulseKind::System(c),
            c => PulseKind::User(c),
        }
    }

    /// True for codes reserved by the kernel
    pub fn is_system(&self) -> bool {
        self.code < 0
    }
}

impl WireRecord for Pulse {
    const SIZE: usize = 24;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.pulse_type.to_le_bytes());
        out.extend_from_slice(&self.subtype.to_le_bytes());
        out.push(self.code as u8);
        let (tag, raw) = match self.value {
            SigVal::Int(v) => (TAG_INT, v as i64 as u64),
            SigVal::Ptr(p) => (TAG_PTR, p),
        };
        out.push(tag);
        out.extend_from_slice(&[0u8; 2]);
        out.extend_from_slice(&raw.to_le_bytes());
        out.extend_from_slice(&self.scoid.as_raw().to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
    }

    fn read_from(bytes: &[u8]) -> Result<Self, WireError> {
        wire::require(bytes, Self::SIZE)?;
        let raw = wire::u64_at(bytes, 8);
        let value = match wire::u8_at(bytes, 5) {
            TAG_INT => SigVal::Int(raw as i64 as i32),
            TAG_PTR => SigVal::Ptr(raw),
            other => return Err(WireError::BadValueTag(other)),
        };
        Ok(Self {
            pulse_type: wire::i16_at(bytes, 0),
            subtype: wire::i16_at(bytes, 2),
            code: wire::u8_at(bytes, 4) as i8,
            value,
            scoid: ServerConnectionId::from_raw(wire::i32_at(bytes, 16)),
        })
    }
}

impl fmt::Display for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<pulse {},{}>", self.code, self.value.as_int())
    }
}
