//! # Core Types
//!
//! This crate defines the fundamental types shared by every layer of the
//! message-passing framework.
//!
//! ## Philosophy
//!
//! - **Handles are typed**: a channel id, a connection id and a receive id
//!   are all small integers to the kernel, but never to us.
//! - **Sentinels are explicit**: the invalid connection and the pulse
//!   receive id are named constants, not magic numbers.
//!
//! ## Key Types
//!
//! - [`ChannelId`], [`ConnectionId`], [`ServerConnectionId`]: kernel handles
//! - [`ReceiveId`]: correlation token for an in-flight request
//! - [`NameScope`]: local or global symbolic names
//! - [`errno`]: error numbers carried in error replies

pub mod errno;
pub mod ids;
pub mod names;

pub use ids::{
    ChannelId, ConnectionId, InterruptId, NodeDescriptor, ProcessId, ReceiveId, ServerConnectionId,
    ThreadId, TimerId,
};
pub use names::{NameScope, GLOBAL_NAME_PREFIX, LOCAL_NAME_PREFIX};
