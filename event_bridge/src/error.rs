//! Event bridge error types

use kernel_api::KernelError;
use messaging::TransportError;
use thiserror::Error;

/// Errors raised by interrupt and timer wrappers and the pulse bridge
#[derive(Debug, Error)]
pub enum EventError {
    /// No interrupt line was given at construction or attach time
    #[error("no irq defined")]
    NoIrq,

    /// The wrapper holds no kernel attachment or timer
    #[error("not attached")]
    NotAttached,

    /// No event was given at construction or create time
    #[error("no event defined")]
    NoEvent,

    /// No start/interval times were given
    #[error("no start/interval time defined")]
    NoTimes,

    /// The interrupt handler reported a failure
    #[error("interrupt handler failed: {0}")]
    HandlerFailed(String),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
