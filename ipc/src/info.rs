//! Sender information returned with every received message

use core_types::{
    ChannelId, ConnectionId, NodeDescriptor, ProcessId, ServerConnectionId, ThreadId,
};
use serde::{Deserialize, Serialize};

/// Everything the kernel knows about the sender of a message
///
/// `srcmsglen` is the full length the client sent; `msglen` is how much
/// of it landed in the receive buffer. When `srcmsglen > msglen` the
/// receiver has to pull the rest with an explicit read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgInfo {
    pub nd: NodeDescriptor,
    pub srcnd: NodeDescriptor,
    pub pid: ProcessId,
    pub tid: ThreadId,
    pub chid: ChannelId,
    pub scoid: ServerConnectionId,
    pub coid: ConnectionId,
    /// Bytes copied into the receive buffer
    pub msglen: usize,
    /// Bytes the sender sent
    pub srcmsglen: usize,
    /// Room the sender left for the reply
    pub dstmsglen: usize,
    pub priority: i16,
    pub flags: i16,
}

impl MsgInfo {
    /// True when part of the message did not fit the receive buffer
    pub fn is_truncated(&self) -> bool {
        self.srcmsglen > self.msglen
    }
}

impl Default for MsgInfo {
    fn default() -> Self {
        Self {
            nd: NodeDescriptor::LOCAL,
            srcnd: NodeDescriptor::LOCAL,
            pid: ProcessId::from_raw(0),
            tid: ThreadId::from_raw(0),
            chid: ChannelId::INVALID,
            scoid: ServerConnectionId::from_raw(0),
            coid: ConnectionId::INVALID,
            msglen: 0,
            srcmsglen: 0,
            dstmsglen: 0,
            priority: 0,
            flags: 0,
        }
    }
}
