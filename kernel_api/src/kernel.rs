//! Kernel API trait and message-passing types

use crate::{ChannelFlags, Duration, Instant, KernelError};
use core_types::{
    ChannelId, ConnectionId, NameScope, NodeDescriptor, ProcessId, ReceiveId,
};
use ipc::{MsgInfo, SigEvent, SigVal};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registration of a path in the kernel namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathId(u32);

impl PathId {
    /// Wraps a raw registration id
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw registration id
    pub const fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self.0)
    }
}

/// Result of registering a channel under a symbolic name
///
/// `dpp` is the discovery handle needed to detach the name again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAttachment {
    pub chid: ChannelId,
    pub dpp: PathId,
    pub name: String,
    pub scope: NameScope,
}

impl NameAttachment {
    /// Full namespace path of the name
    pub fn path(&self) -> String {
        self.scope.path_of(&self.name)
    }
}

/// What a completed send returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    /// Status the server passed to its reply
    pub status: i32,
    /// Bytes of reply data copied into the caller's buffer
    pub reply_len: usize,
}

/// The kernel API trait
///
/// This defines the interface between user-space and the message-passing
/// kernel. Multiple implementations are possible:
/// - Simulated kernel (for testing)
/// - Real kernel (syscalls)
///
/// # Design Principles
///
/// **Shared handle**: every method takes `&self`. A kernel is shared between
/// a server thread and its clients as `Arc<K>`, and blocking calls block
/// only the calling thread.
///
/// **Synchronous rendezvous**: `msg_send` blocks until the server replies,
/// `msg_receive` blocks until a message or pulse arrives.
///
/// **Explicit time**: time is read and slept through the kernel so a
/// simulated kernel can control it.
///
/// # Example
///
/// ```
/// use kernel_api::{ChannelFlags, KernelApi, KernelError};
///
/// fn open_queue<K: KernelApi>(kernel: &K) -> Result<(), KernelError> {
///     let chid = kernel.channel_create(ChannelFlags::DISCONNECT)?;
///     println!("Created {}", chid);
///     kernel.channel_destroy(chid)
/// }
/// ```
pub trait KernelApi: Send + Sync {
    /// Process id of the caller
    fn pid(&self) -> ProcessId;

    /// Creates a receive queue
    fn channel_create(&self, flags: ChannelFlags) -> Result<ChannelId, KernelError>;

    /// Destroys a receive queue; blocked senders fail
    fn channel_destroy(&self, chid: ChannelId) -> Result<(), KernelError>;

    /// Binds a new connection to `chid` in process `pid` on node `nd`
    fn connect_attach(
        &self,
        nd: NodeDescriptor,
        pid: ProcessId,
        chid: ChannelId,
        index: i32,
        flags: i32,
    ) -> Result<ConnectionId, KernelError>;

    /// Releases a connection
    fn connect_detach(&self, coid: ConnectionId) -> Result<(), KernelError>;

    /// Creates a channel and registers it under `name`
    fn name_attach(&self, name: &str, scope: NameScope) -> Result<NameAttachment, KernelError>;

    /// Removes a name registration and destroys its channel
    fn name_detach(&self, attachment: &NameAttachment) -> Result<(), KernelError>;

    /// Resolves `name` and connects to its channel
    fn name_open(&self, name: &str, scope: NameScope) -> Result<ConnectionId, KernelError>;

    /// Closes a connection made by `name_open`
    fn name_close(&self, coid: ConnectionId) -> Result<(), KernelError>;

    /// Registers `path` as served by `chid`
    fn path_attach(&self, path: &str, chid: ChannelId) -> Result<PathId, KernelError>;

    /// Removes a path registration
    fn path_detach(&self, id: PathId) -> Result<(), KernelError>;

    /// Resolves `path` and connects to the channel serving it
    ///
    /// Returns the connection and the part of `path` below the registered
    /// prefix, which is what the server sees in a connect request.
    fn path_open(&self, path: &str) -> Result<(ConnectionId, String), KernelError>;

    /// True when `path` is currently registered
    fn path_exists(&self, path: &str) -> bool;

    /// Sends `msg` and blocks until the server replies into `reply`
    fn msg_send(
        &self,
        coid: ConnectionId,
        msg: &[u8],
        reply: &mut [u8],
    ) -> Result<SendOutcome, KernelError>;

    /// Blocks until a message or pulse arrives on `chid`
    ///
    /// At most `buf.len()` bytes are copied; the returned info reports the
    /// full length the sender sent.
    fn msg_receive(
        &self,
        chid: ChannelId,
        buf: &mut [u8],
    ) -> Result<(ReceiveId, MsgInfo), KernelError>;

    /// Copies message bytes starting at `offset` from a pending sender
    fn msg_read(&self, rcvid: ReceiveId, buf: &mut [u8], offset: usize)
        -> Result<usize, KernelError>;

    /// Replies to a pending sender and unblocks it
    fn msg_reply(&self, rcvid: ReceiveId, status: i32, data: &[u8]) -> Result<(), KernelError>;

    /// Unblocks a pending sender with an error number
    fn msg_error(&self, rcvid: ReceiveId, errno: i32) -> Result<(), KernelError>;

    /// Returns sender information for a pending request
    fn msg_info(&self, rcvid: ReceiveId) -> Result<MsgInfo, KernelError>;

    /// Queues a pulse on the channel behind `coid`; never blocks
    fn msg_send_pulse(
        &self,
        coid: ConnectionId,
        priority: i16,
        code: i8,
        value: SigVal,
    ) -> Result<(), KernelError>;

    /// Delivers `event` on behalf of the sender identified by `rcvid`
    fn msg_deliver_event(&self, rcvid: ReceiveId, event: &SigEvent) -> Result<(), KernelError>;

    /// Current time
    fn now(&self) -> Instant;

    /// Suspends the caller for `duration`
    fn sleep(&self, duration: Duration);
}
