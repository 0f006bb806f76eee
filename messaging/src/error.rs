//! Transport error types

use core_types::errno;
use ipc::{PayloadError, WireError};
use kernel_api::KernelError;
use thiserror::Error;

/// Errors returned by the connection manager and the message transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// No channel is held; receiving is a caller contract violation
    #[error("no channel: create or attach one before receiving")]
    NoChannel,

    /// No connection is bound; the send was not attempted
    #[error("no connection bound")]
    NoConnection,

    /// The blocked call was interrupted before the peer answered
    #[error("call interrupted")]
    Interrupted,

    #[error(transparent)]
    Kernel(KernelError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Wire(#[from] WireError),

    /// A server worker thread panicked
    #[error("server thread panicked: {0}")]
    WorkerPanicked(String),
}

impl TransportError {
    /// The `(status, length)` pair a caller of the classic send API sees
    pub fn status_pair(&self) -> (i32, usize) {
        (-1, 0)
    }

    /// Error number describing this failure
    pub fn errno(&self) -> i32 {
        match self {
            TransportError::NoChannel => errno::ESRCH,
            TransportError::NoConnection => errno::EBADF,
            TransportError::Interrupted => errno::EINTR,
            TransportError::Kernel(err) => err.errno(),
            TransportError::Payload(_) | TransportError::Wire(_) => errno::EBADMSG,
            TransportError::WorkerPanicked(_) => errno::EIO,
        }
    }
}

impl From<KernelError> for TransportError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::Interrupted => TransportError::Interrupted,
            other => TransportError::Kernel(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_is_distinct() {
        let err: TransportError = KernelError::Interrupted.into();
        assert!(matches!(err, TransportError::Interrupted));
        assert_eq!(err.errno(), errno::EINTR);
    }

    #[test]
    fn test_server_error_keeps_errno() {
        let err: TransportError = KernelError::ServerError(errno::ENOSYS).into();
        assert_eq!(err.errno(), errno::ENOSYS);
        assert_eq!(err.status_pair(), (-1, 0));
    }
}
