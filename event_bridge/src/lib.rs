//! # Event Bridge
//!
//! This crate connects asynchronous event sources to the ordinary receive
//! path.
//!
//! ## Philosophy
//!
//! - **No callbacks from the kernel**: timers and interrupts deliver an
//!   event; user code decides when to look at it
//! - **Everything is a pulse**: a timer tick, an interrupt notification and
//!   a client disconnect all arrive through `receive` with receive id zero
//! - **Wrappers own their handles**: an [`Interrupt`] or [`Timer`] knows its
//!   kernel id and cleans it up explicitly
//!
//! ## Pieces
//!
//! - [`Interrupt`]: attach/wait/mask/unmask/detach and a service loop
//! - [`Timer`]: create/settime/stop/delete with fractional seconds
//! - [`EventBridge`]: a private channel that classifies incoming pulses

pub mod bridge;
pub mod error;
pub mod interrupt;
pub mod timer;

pub use bridge::{BridgeEvent, EventBridge};
pub use error::EventError;
pub use interrupt::Interrupt;
pub use timer::Timer;
