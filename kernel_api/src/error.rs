//! Kernel error types

use core_types::{errno, ChannelId, ConnectionId, InterruptId, ReceiveId, TimerId};
use thiserror::Error;

/// Errors that can occur when interacting with the kernel
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KernelError {
    /// No channel with this id
    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),

    /// No connection with this id
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// The receive id was never issued or has already been replied to
    #[error("Stale receive id: {0}")]
    StaleReceiveId(ReceiveId),

    /// A name or path is already registered
    #[error("Name already in use: {0}")]
    NameInUse(String),

    /// A name or path could not be resolved
    #[error("Name not found: {0}")]
    NameNotFound(String),

    /// The server answered with an error reply
    #[error("Server replied with error {}", errno::name(*.0))]
    ServerError(i32),

    /// A blocked call was interrupted before it completed
    #[error("Call interrupted")]
    Interrupted,

    /// The kernel ran out of a resource
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// No interrupt attachment with this id
    #[error("Interrupt not found: {0}")]
    InterruptNotFound(InterruptId),

    /// No timer with this id
    #[error("Timer not found: {0}")]
    TimerNotFound(TimerId),

    /// An argument was out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl KernelError {
    /// Error number a caller would see in `errno`
    pub fn errno(&self) -> i32 {
        match self {
            KernelError::ChannelNotFound(_) => errno::ESRCH,
            KernelError::ConnectionNotFound(_) => errno::EBADF,
            KernelError::StaleReceiveId(_) => errno::ESRCH,
            KernelError::NameInUse(_) => errno::EEXIST,
            KernelError::NameNotFound(_) => errno::ENOENT,
            KernelError::ServerError(code) => *code,
            KernelError::Interrupted => errno::EINTR,
            KernelError::ResourceExhausted(_) => errno::EAGAIN,
            KernelError::InterruptNotFound(_) => errno::EINVAL,
            KernelError::TimerNotFound(_) => errno::EINVAL,
            KernelError::InvalidArgument(_) => errno::EINVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(KernelError::Interrupted.errno(), errno::EINTR);
        assert_eq!(KernelError::ServerError(errno::ENOSYS).errno(), errno::ENOSYS);
        assert_eq!(
            KernelError::NameNotFound("svc".to_string()).errno(),
            errno::ENOENT
        );
        assert_eq!(
            KernelError::ChannelNotFound(ChannelId::from_raw(3)).errno(),
            errno::ESRCH
        );
    }

    #[test]
    fn test_server_error_display_names_errno() {
        let message = format!("{}", KernelError::ServerError(errno::EBADF));
        assert!(message.contains("EBADF"));
    }
}
