//! Resource manager error types

use crate::{ConnectOp, IoOp, SessionKey};
use core_types::errno;
use ipc::{PayloadError, WireError};
use kernel_api::KernelError;
use messaging::TransportError;
use thiserror::Error;

/// Errors raised while serving or using a resource manager
#[derive(Debug, Error)]
pub enum ResmgrError {
    /// The requested access is not allowed by the resource mode
    #[error("access denied")]
    AccessDenied,

    /// The path below the mount point does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// No session is bound to the requesting connection
    #[error("no session bound to the connection")]
    NoSession,

    #[error("unknown session: {0}")]
    UnknownSession(SessionKey),

    /// The session was not opened for the requested direction
    #[error("session not open for {0}")]
    NotOpenFor(&'static str),

    /// The request carried a value out of range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The resource is locked by another thread
    #[error("resource busy")]
    Busy,

    /// The server answered a client request with an error number
    #[error("server replied with error {}", errno::name(*.0))]
    Server(i32),

    /// The manager has stopped dispatching
    #[error("dispatch terminated")]
    Terminated,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl ResmgrError {
    /// Error number sent back when a handler fails with this error
    pub fn errno(&self) -> i32 {
        match self {
            ResmgrError::AccessDenied => errno::EACCES,
            ResmgrError::NotFound(_) => errno::ENOENT,
            ResmgrError::NoSession
            | ResmgrError::UnknownSession(_)
            | ResmgrError::NotOpenFor(_) => errno::EBADF,
            ResmgrError::InvalidArgument(_) => errno::EINVAL,
            ResmgrError::Busy => errno::EBUSY,
            ResmgrError::Server(code) => *code,
            ResmgrError::Terminated => errno::ESRCH,
            ResmgrError::Transport(err) => err.errno(),
            ResmgrError::Wire(_) | ResmgrError::Payload(_) => errno::EBADMSG,
        }
    }
}

impl From<KernelError> for ResmgrError {
    fn from(err: KernelError) -> Self {
        ResmgrError::Transport(err.into())
    }
}

/// A handler registration that could not be honored
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// No operation has this name
    #[error("no io or connect entry named {0:?}")]
    UnknownName(String),

    /// The name is valid but the handler is of the other class
    #[error("{name:?} is not a {expected} operation")]
    WrongClass { name: String, expected: &'static str },

    /// Handlers can only be added before dispatching starts
    #[error("handlers cannot be added while dispatching")]
    AlreadyDispatching,
}

impl RegistrationError {
    pub(crate) fn wrong_connect(name: &str) -> Self {
        RegistrationError::WrongClass {
            name: name.to_string(),
            expected: "connect",
        }
    }

    pub(crate) fn wrong_io(name: &str) -> Self {
        RegistrationError::WrongClass {
            name: name.to_string(),
            expected: "io",
        }
    }
}

/// Handler names resolved against one table
pub(crate) fn connect_op(name: &str) -> Result<ConnectOp, RegistrationError> {
    match (ConnectOp::from_name(name), IoOp::from_name(name)) {
        (Some(op), _) => Ok(op),
        (None, Some(_)) => Err(RegistrationError::wrong_connect(name)),
        (None, None) => Err(RegistrationError::UnknownName(name.to_string())),
    }
}

pub(crate) fn io_op(name: &str) -> Result<IoOp, RegistrationError> {
    match (IoOp::from_name(name), ConnectOp::from_name(name)) {
        (Some(op), _) => Ok(op),
        (None, Some(_)) => Err(RegistrationError::wrong_io(name)),
        (None, None) => Err(RegistrationError::UnknownName(name.to_string())),
    }
}
