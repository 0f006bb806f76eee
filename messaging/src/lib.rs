//! # Messaging
//!
//! This crate implements the channel/connection manager and the message
//! transport on top of [`kernel_api::KernelApi`].
//!
//! ## Philosophy
//!
//! - **Explicit handles**: every manager owns its kernel handle as an
//!   `Arc<K>`; there is no process-wide library instance
//! - **Synchronous rendezvous**: `send` blocks until the reply, `receive`
//!   blocks until a message or pulse
//! - **Buffers grow, never shrink**: a receive never loses bytes the sender
//!   sent, however large the message
//! - **Failures are values**: a missing connection or channel is an error
//!   returned to the caller, never a panic
//!
//! ## Layers
//!
//! - [`Connector`]: channel create/destroy, name attach/open, connect/detach
//! - [`Messenger`]: send/receive/reply, pulses, event delivery, encoding
//! - [`Server`] / [`ThreadedServer`] / [`Client`]: name-based endpoints
//! - [`wait_for_attach`]: block until a server shows up

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod messenger;
pub mod server;
pub mod waitfor;

pub use client::Client;
pub use config::TransportConfig;
pub use connector::{Connector, Release};
pub use error::TransportError;
pub use messenger::{Messenger, ReceiveStats, Received, SendReply};
pub use server::{Flow, ServeSummary, Server, ThreadedServer};
pub use waitfor::{wait_for_attach, wait_for_path, POLL_INTERVAL};
