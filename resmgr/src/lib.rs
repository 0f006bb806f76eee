//! # Resource managers
//!
//! A resource manager attaches a path and serves the connect and io
//! messages clients send to it: open, read, write, stat, lseek, devctl,
//! close and the rest of the io table.
//!
//! ## Philosophy
//!
//! - **Tables are data**: handlers are registered per opcode in a builder;
//!   the table is fixed once dispatching starts
//! - **Every request gets an answer**: a handler returns an [`Outcome`],
//!   and a failing handler becomes an error reply, never a hung client
//! - **Sessions are keyed, not linked**: open sessions live in a
//!   [`SessionArena`] and are found by [`SessionKey`] or by the client
//!   connection that owns them
//! - **Pulses stay out of the tables**: kernel pulses keep session state in
//!   step (disconnect, unblock) and reach only pulse handlers
//!
//! ## Example
//!
//! ```ignore
//! let mut manager = ResourceManager::<_, ()>::builder(kernel.clone(), "/dev/sample")
//!     .on_io(IoOp::Read, |hc, req| defaults::read_bytes(hc, req, b"hello"))
//!     .build()?;
//! std::thread::spawn(move || manager.run());
//!
//! let mut client = ResourceClient::open(kernel, "/dev/sample", IOFLAG_READ)?;
//! assert_eq!(client.read(5)?, b"hello");
//! ```

pub mod attr;
pub mod client;
pub mod config;
pub mod context;
pub mod defaults;
pub mod error;
pub mod handler;
pub mod manager;
pub mod ops;
pub mod session;

pub use attr::Attr;
pub use client::ResourceClient;
pub use config::ResmgrAttr;
pub use context::{ConnectRequest, Context, IoRequest};
pub use error::{RegistrationError, ResmgrError};
pub use handler::{
    ConnectHandler, Control, HandlerContext, IoHandler, Outcome, PulseHandler, SessionInit,
};
pub use manager::{
    DispatchState, DispatchStats, Dispatched, Disposition, ResourceManager, ResourceManagerBuilder,
};
pub use ops::{ConnectOp, IoOp, Op};
pub use session::{Ocb, OpenRequest, SessionArena, SessionKey, IOFLAG_READ, IOFLAG_WRITE};
