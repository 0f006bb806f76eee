//! Opcode tables
//!
//! Connect requests are routed by the subtype of their connect header, io
//! requests by their message type. Both sets are closed: a handler can be
//! registered only for an opcode listed here.

use ipc::{connect_subtype, msg_type};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connect-class operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConnectOp {
    Open,
    Unlink,
    Rename,
    Mknod,
    Readlink,
    Link,
    Unblock,
    Mount,
}

impl ConnectOp {
    pub const ALL: [ConnectOp; 8] = [
        ConnectOp::Open,
        ConnectOp::Unlink,
        ConnectOp::Rename,
        ConnectOp::Mknod,
        ConnectOp::Readlink,
        ConnectOp::Link,
        ConnectOp::Unblock,
        ConnectOp::Mount,
    ];

    /// Routes a connect subtype; combine requests are opens
    pub fn from_subtype(subtype: u16) -> Option<Self> {
        match subtype {
            connect_subtype::COMBINE | connect_subtype::COMBINE_CLOSE | connect_subtype::OPEN => {
                Some(ConnectOp::Open)
            }
            connect_subtype::UNLINK => Some(ConnectOp::Unlink),
            connect_subtype::RENAME => Some(ConnectOp::Rename),
            connect_subtype::MKNOD => Some(ConnectOp::Mknod),
            connect_subtype::READLINK => Some(ConnectOp::Readlink),
            connect_subtype::LINK => Some(ConnectOp::Link),
            connect_subtype::UNBLOCK => Some(ConnectOp::Unblock),
            connect_subtype::MOUNT => Some(ConnectOp::Mount),
            _ => None,
        }
    }

    /// Subtype a client puts in the connect header
    pub fn subtype(&self) -> u16 {
        match self {
            ConnectOp::Open => connect_subtype::OPEN,
            ConnectOp::Unlink => connect_subtype::UNLINK,
            ConnectOp::Rename => connect_subtype::RENAME,
            ConnectOp::Mknod => connect_subtype::MKNOD,
            ConnectOp::Readlink => connect_subtype::READLINK,
            ConnectOp::Link => connect_subtype::LINK,
            ConnectOp::Unblock => connect_subtype::UNBLOCK,
            ConnectOp::Mount => connect_subtype::MOUNT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectOp::Open => "open",
            ConnectOp::Unlink => "unlink",
            ConnectOp::Rename => "rename",
            ConnectOp::Mknod => "mknod",
            ConnectOp::Readlink => "readlink",
            ConnectOp::Link => "link",
            ConnectOp::Unblock => "unblock",
            ConnectOp::Mount => "mount",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for ConnectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connect:{}", self.name())
    }
}

/// Io-class operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IoOp {
    Read,
    Write,
    Close,
    Stat,
    Notify,
    Devctl,
    Unblock,
    Pathconf,
    Lseek,
    Chmod,
    Chown,
    Utime,
    Openfd,
    Fdinfo,
    Lock,
    Space,
    Shutdown,
    Mmap,
    Msg,
    Dup,
    CloseDup,
    LockOcb,
    UnlockOcb,
    Sync,
    Power,
}

impl IoOp {
    pub const ALL: [IoOp; 25] = [
        IoOp::Read,
        IoOp::Write,
        IoOp::Close,
        IoOp::Stat,
        IoOp::Notify,
        IoOp::Devctl,
        IoOp::Unblock,
        IoOp::Pathconf,
        IoOp::Lseek,
        IoOp::Chmod,
        IoOp::Chown,
        IoOp::Utime,
        IoOp::Openfd,
        IoOp::Fdinfo,
        IoOp::Lock,
        IoOp::Space,
        IoOp::Shutdown,
        IoOp::Mmap,
        IoOp::Msg,
        IoOp::Dup,
        IoOp::CloseDup,
        IoOp::LockOcb,
        IoOp::UnlockOcb,
        IoOp::Sync,
        IoOp::Power,
    ];

    /// Routes an io message type; the reserved slot routes nowhere
    pub fn from_msg_type(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.msg_type() == value)
    }

    /// Message type carried in the io header
    pub fn msg_type(&self) -> u16 {
        match self {
            IoOp::Read => msg_type::IO_READ,
            IoOp::Write => msg_type::IO_WRITE,
            IoOp::Close => msg_type::IO_CLOSE_OCB,
            IoOp::Stat => msg_type::IO_STAT,
            IoOp::Notify => msg_type::IO_NOTIFY,
            IoOp::Devctl => msg_type::IO_DEVCTL,
            IoOp::Unblock => msg_type::IO_UNBLOCK,
            IoOp::Pathconf => msg_type::IO_PATHCONF,
            IoOp::Lseek => msg_type::IO_LSEEK,
            IoOp::Chmod => msg_type::IO_CHMOD,
            IoOp::Chown => msg_type::IO_CHOWN,
            IoOp::Utime => msg_type::IO_UTIME,
            IoOp::Openfd => msg_type::IO_OPENFD,
            IoOp::Fdinfo => msg_type::IO_FDINFO,
            IoOp::Lock => msg_type::IO_LOCK,
            IoOp::Space => msg_type::IO_SPACE,
            IoOp::Shutdown => msg_type::IO_SHUTDOWN,
            IoOp::Mmap => msg_type::IO_MMAP,
            IoOp::Msg => msg_type::IO_MSG,
            IoOp::Dup => msg_type::IO_DUP,
            IoOp::CloseDup => msg_type::IO_CLOSE,
            IoOp::LockOcb => msg_type::IO_LOCK_OCB,
            IoOp::UnlockOcb => msg_type::IO_UNLOCK_OCB,
            IoOp::Sync => msg_type::IO_SYNC,
            IoOp::Power => msg_type::IO_POWER,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IoOp::Read => "read",
            IoOp::Write => "write",
            IoOp::Close => "close",
            IoOp::Stat => "stat",
            IoOp::Notify => "notify",
            IoOp::Devctl => "devctl",
            IoOp::Unblock => "unblock",
            IoOp::Pathconf => "pathconf",
            IoOp::Lseek => "lseek",
            IoOp::Chmod => "chmod",
            IoOp::Chown => "chown",
            IoOp::Utime => "utime",
            IoOp::Openfd => "openfd",
            IoOp::Fdinfo => "fdinfo",
            IoOp::Lock => "lock",
            IoOp::Space => "space",
            IoOp::Shutdown => "shutdown",
            IoOp::Mmap => "mmap",
            IoOp::Msg => "msg",
            IoOp::Dup => "dup",
            IoOp::CloseDup => "close_dup",
            IoOp::LockOcb => "lock_ocb",
            IoOp::UnlockOcb => "unlock_ocb",
            IoOp::Sync => "sync",
            IoOp::Power => "power",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io:{}", self.name())
    }
}

/// Either class of operation, for name-based registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Connect(ConnectOp),
    Io(IoOp),
}

impl Op {
    /// Looks a handler name up in the io table, then the connect table
    ///
    /// `unblock` exists in both; by name it means the io entry.
    pub fn from_name(name: &str) -> Option<Self> {
        IoOp::from_name(name)
            .map(Op::Io)
            .or_else(|| ConnectOp::from_name(name).map(Op::Connect))
    }
}
