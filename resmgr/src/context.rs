//! Per-request context and decoded requests

use crate::{ConnectOp, IoOp};
use core_types::{ChannelId, ReceiveId};
use ipc::{ConnectHeader, ConnectMessage, MsgInfo, WireError, WireRecord};
use kernel_api::PathId;

/// Where a request came from and how much of it has been consumed
///
/// Contexts are plain values. A helper that works on part of a message
/// gets a copy with its own offset instead of decoding the request again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub rcvid: ReceiveId,
    pub info: MsgInfo,
    pub chid: ChannelId,
    pub dpp: Option<PathId>,
    /// Bytes of the message already consumed by headers
    pub offset: usize,
    /// Total message length
    pub size: usize,
}

impl Context {
    /// Same request, positioned at `offset`
    pub fn at(&self, offset: usize) -> Self {
        Self { offset, ..*self }
    }

    /// Bytes after the current offset
    pub fn remaining(&self) -> usize {
        self.size.saturating_sub(self.offset)
    }
}

/// A decoded connect request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub op: ConnectOp,
    pub message: ConnectMessage,
}

impl ConnectRequest {
    /// Path below the manager's mount point; empty for the mount point itself
    pub fn path(&self) -> &str {
        &self.message.path
    }

    pub fn extra(&self) -> &[u8] {
        &self.message.extra
    }

    pub fn header(&self) -> &ConnectHeader {
        &self.message.header
    }

    pub fn ioflag(&self) -> u32 {
        self.message.header.ioflag
    }
}

/// An io request with its raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoRequest {
    pub op: IoOp,
    bytes: Vec<u8>,
}

impl IoRequest {
    pub fn new(op: IoOp, bytes: Vec<u8>) -> Self {
        Self { op, bytes }
    }

    /// Decodes the fixed header at the start of the request
    pub fn header<R: WireRecord>(&self) -> Result<R, WireError> {
        R::read_from(&self.bytes)
    }

    /// Offset of the data following the header (`combine_len`)
    pub fn data_offset(&self) -> usize {
        if self.bytes.len() < 4 {
            return self.bytes.len();
        }
        let combine_len = u16::from_le_bytes([self.bytes[2], self.bytes[3]]) as usize;
        combine_len.min(self.bytes.len())
    }

    /// Data carried after the header, such as the bytes of a write
    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.data_offset()..]
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipc::{connect_subtype, msg_type, IoHeader};

    #[test]
    fn test_context_at_keeps_request() {
        let ctx = Context {
            rcvid: ReceiveId::from_raw(3),
            info: MsgInfo::default(),
            chid: ChannelId::from_raw(1),
            dpp: None,
            offset: 0,
            size: 20,
        };
        let moved = ctx.at(16);
        assert_eq!(moved.rcvid, ctx.rcvid);
        assert_eq!(moved.remaining(), 4);
        assert_eq!(ctx.at(40).remaining(), 0);
    }

    #[test]
    fn test_io_payload_follows_header() {
        let mut bytes = IoHeader::new(msg_type::IO_WRITE, 3).to_bytes();
        bytes.extend_from_slice(b"abc");
        let request = IoRequest::new(IoOp::Write, bytes);
        assert_eq!(request.header::<IoHeader>().unwrap().nbytes, 3);
        assert_eq!(request.payload(), b"abc");
    }

    #[test]
    fn test_short_io_request_has_no_payload() {
        let request = IoRequest::new(IoOp::Read, vec![1, 1]);
        assert!(request.payload().is_empty());
        assert!(request.header::<IoHeader>().is_err());
    }

    #[test]
    fn test_connect_accessors() {
        let mut header = ConnectHeader::new(connect_subtype::OPEN);
        header.ioflag = 3;
        let request = ConnectRequest {
            op: ConnectOp::Open,
            message: ConnectMessage::new(header, "sub/dir", vec![9]).unwrap(),
        };
        assert_eq!(request.path(), "sub/dir");
        assert_eq!(request.extra(), &[9]);
        assert_eq!(request.ioflag(), 3);
    }
}
