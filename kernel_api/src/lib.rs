//! # Kernel API
//!
//! This crate defines the boundary between the message-passing framework
//! and the kernel that provides channels, connections and the send,
//! receive and reply primitives.
//!
//! ## Philosophy
//!
//! The kernel provides **mechanisms**, not policies:
//! - Channels and connections (not sockets)
//! - Synchronous send/receive/reply (not queues of callbacks)
//! - Pulses for one-way notification
//! - Time, timers and interrupts surfaced as events
//!
//! ## Design Goals
//!
//! 1. **Testability**: The entire API can be simulated in-process
//! 2. **Explicitness**: Every handle is passed in; there is no global
//!    library binding
//! 3. **Type safety**: Handles are distinct newtypes
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A network transport (node descriptors are opaque)
//! - A serializer (payload encoding lives in `ipc`)

pub mod error;
pub mod flags;
pub mod interrupt;
pub mod kernel;
pub mod time;
pub mod timer;

pub use error::KernelError;
pub use flags::{ChannelFlags, SIDE_CHANNEL};
pub use interrupt::{InterruptApi, INTR_FLAGS_END, INTR_FLAGS_PROCESS, INTR_FLAGS_TRK_MSK};
pub use kernel::{KernelApi, NameAttachment, PathId, SendOutcome};
pub use time::{Duration, Instant};
pub use timer::{TimerApi, TimerSpec};
