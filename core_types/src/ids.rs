//! Integer handles for kernel objects
//!
//! The kernel hands out small integers for every object it manages. Each
//! kind of handle gets its own newtype so a connection id can never be
//! passed where a channel id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! kernel_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(i32);

        impl $name {
            /// Wraps a raw kernel value
            pub const fn from_raw(raw: i32) -> Self {
                Self(raw)
            }

            /// Returns the raw kernel value
            pub const fn as_raw(&self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

kernel_handle!(
    /// Server-side receive queue handle (`chid`)
    ChannelId,
    "Channel"
);

kernel_handle!(
    /// Client-side binding to a channel (`coid`)
    ///
    /// The raw value `-1` is the invalid sentinel and is never handed out
    /// by a kernel.
    ConnectionId,
    "Connection"
);

kernel_handle!(
    /// Server-side view of a client connection (`scoid`)
    ServerConnectionId,
    "ServerConnection"
);

kernel_handle!(
    /// Process identifier
    ProcessId,
    "Pid"
);

kernel_handle!(
    /// Thread identifier, unique within a process
    ThreadId,
    "Tid"
);

kernel_handle!(
    /// Timer created by the kernel
    TimerId,
    "Timer"
);

kernel_handle!(
    /// Interrupt attachment
    InterruptId,
    "Interrupt"
);

impl ConnectionId {
    /// The invalid connection sentinel
    pub const INVALID: ConnectionId = ConnectionId(-1);

    /// Returns true unless this is the invalid sentinel
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl ChannelId {
    /// The invalid channel sentinel
    pub const INVALID: ChannelId = ChannelId(-1);

    /// Returns true unless this is the invalid sentinel
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

/// Correlation token for one in-flight request (`rcvid`)
///
/// Zero marks a pulse, negative values are kernel errors, and every
/// positive value names a sender that is waiting for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReceiveId(i32);

impl ReceiveId {
    /// The receive id reported for pulses
    pub const PULSE: ReceiveId = ReceiveId(0);

    /// Wraps a raw kernel value
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw kernel value
    pub const fn as_raw(&self) -> i32 {
        self.0
    }

    /// True when the receive delivered a pulse rather than a message
    pub fn is_pulse(&self) -> bool {
        self.0 == 0
    }

    /// True when the receive id names a blocked sender
    pub fn is_message(&self) -> bool {
        self.0 > 0
    }

    /// True for the negative error range
    pub fn is_error(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ReceiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pulse() {
            write!(f, "Rcvid(pulse)")
        } else {
            write!(f, "Rcvid({})", self.0)
        }
    }
}

/// Node descriptor
///
/// Opaque to this framework; `LOCAL` addresses the current node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NodeDescriptor(u32);

impl NodeDescriptor {
    /// The local node
    pub const LOCAL: NodeDescriptor = NodeDescriptor(0);

    /// Wraps a raw node descriptor
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw node descriptor
    pub const fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}
