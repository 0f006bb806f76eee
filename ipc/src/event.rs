//! Event descriptors
//!
//! An event tells the kernel how to notify a thread when something
//! happens: a timer expires, an interrupt fires, or a server wants to
//! wake a client with `deliver_event`.

use crate::pulse::SigVal;
use core_types::ConnectionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notify with a pulse
pub const SIGEV_PULSE: i32 = 4;
/// Notify by unblocking the target thread
pub const SIGEV_UNBLOCK: i32 = 5;
/// Notify an interrupt waiter
pub const SIGEV_INTR: i32 = 6;

/// Default pulse priority
pub const DEFAULT_PULSE_PRIORITY: i16 = 10;

/// How a notification is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigEvent {
    /// Queue a pulse on the channel behind `coid`
    Pulse {
        coid: ConnectionId,
        priority: i16,
        code: i8,
        value: SigVal,
    },
    /// Unblock the target thread
    Unblock,
    /// Wake a thread blocked in interrupt wait
    Interrupt,
}

impl SigEvent {
    /// Builds a pulse event
    pub fn pulse(coid: ConnectionId, priority: i16, code: i8, value: SigVal) -> Self {
        SigEvent::Pulse {
            coid,
            priority,
            code,
            value,
        }
    }

    /// Returns the `sigev_notify` discriminator
    pub fn notify(&self) -> i32 {
        match self {
            SigEvent::Pulse { .. } => SIGEV_PULSE,
            SigEvent::Unblock => SIGEV_UNBLOCK,
            SigEvent::Interrupt => SIGEV_INTR,
        }
    }
}

impl fmt::Display for SigEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigEvent::Pulse { code, value, .. } => {
                write!(f, "<pulse {},{}>", code, value.as_int())
            }
            SigEvent::Unblock => write!(f, "<unblock >"),
            SigEvent::Interrupt => write!(f, "<intr >"),
        }
    }
}
