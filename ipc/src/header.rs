//! Resource-manager message headers
//!
//! Every request to a resource manager starts with a `u16` type. Connect
//! requests (`IO_CONNECT`) carry a 40-byte header followed by a path and
//! optional extra data; io requests carry a per-operation header whose
//! length is recorded in `combine_len`.

use crate::error::WireError;
use crate::wire::{self, WireRecord};
use serde::{Deserialize, Serialize};

/// Message type values
pub mod msg_type {
    pub const IO_BASE: u16 = 0x100;
    pub const IO_CONNECT: u16 = 0x100;
    pub const IO_READ: u16 = 0x101;
    pub const IO_WRITE: u16 = 0x102;
    pub const IO_CLOSE_OCB: u16 = 0x103;
    pub const IO_STAT: u16 = 0x104;
    pub const IO_NOTIFY: u16 = 0x105;
    pub const IO_DEVCTL: u16 = 0x106;
    pub const IO_UNBLOCK: u16 = 0x107;
    pub const IO_PATHCONF: u16 = 0x108;
    pub const IO_LSEEK: u16 = 0x109;
    pub const IO_CHMOD: u16 = 0x10a;
    pub const IO_CHOWN: u16 = 0x10b;
    pub const IO_UTIME: u16 = 0x10c;
    pub const IO_OPENFD: u16 = 0x10d;
    pub const IO_FDINFO: u16 = 0x10e;
    pub const IO_LOCK: u16 = 0x10f;
    pub const IO_SPACE: u16 = 0x110;
    pub const IO_SHUTDOWN: u16 = 0x111;
    pub const IO_MMAP: u16 = 0x112;
    pub const IO_MSG: u16 = 0x113;
    pub const IO_RESERVED: u16 = 0x114;
    pub const IO_DUP: u16 = 0x115;
    pub const IO_CLOSE: u16 = 0x116;
    pub const IO_LOCK_OCB: u16 = 0x117;
    pub const IO_UNLOCK_OCB: u16 = 0x118;
    pub const IO_SYNC: u16 = 0x119;
    pub const IO_POWER: u16 = 0x11a;
    pub const IO_MAX: u16 = 0x11a;
}

/// Subtypes of an `IO_CONNECT` message
pub mod connect_subtype {
    pub const COMBINE: u16 = 0;
    pub const COMBINE_CLOSE: u16 = 1;
    pub const OPEN: u16 = 2;
    pub const UNLINK: u16 = 3;
    pub const RENAME: u16 = 4;
    pub const MKNOD: u16 = 5;
    pub const READLINK: u16 = 6;
    pub const LINK: u16 = 7;
    pub const UNBLOCK: u16 = 8;
    pub const MOUNT: u16 = 9;
}

/// Flag set in `combine_len` when another message follows
pub const COMBINE_FLAG: u16 = 0x8000;

/// Reads the leading `u16` type of any request
pub fn peek_type(bytes: &[u8]) -> Result<u16, WireError> {
    wire::require(bytes, 2)?;
    Ok(wire::u16_at(bytes, 0))
}

/// Fixed part of a connect request (`io_open_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectHeader {
    pub msg_type: u16,
    pub subtype: u16,
    pub file_type: u32,
    pub reply_max: u16,
    pub entry_max: u16,
    pub key: u32,
    pub handle: u32,
    pub ioflag: u32,
    pub mode: u32,
    pub sflag: u16,
    pub access: u16,
    pub reserved: u16,
    pub path_len: u16,
    pub eflag: u8,
    pub extra_type: u8,
    pub extra_len: u16,
}

impl ConnectHeader {
    /// Creates a connect header of the given subtype
    pub fn new(subtype: u16) -> Self {
        Self {
            msg_type: msg_type::IO_CONNECT,
            subtype,
            ..Default::default()
        }
    }
}

impl WireRecord for ConnectHeader {
    const SIZE: usize = 40;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.msg_type.to_le_bytes());
        out.extend_from_slice(&self.subtype.to_le_bytes());
        out.extend_from_slice(&self.file_type.to_le_bytes());
        out.extend_from_slice(&self.reply_max.to_le_bytes());
        out.extend_from_slice(&self.entry_max.to_le_bytes());
        out.extend_from_slice(&self.key.to_le_bytes());
        out.extend_from_slice(&self.handle.to_le_bytes());
        out.extend_from_slice(&self.ioflag.to_le_bytes());
        out.extend_from_slice(&self.mode.to_le_bytes());
        out.extend_from_slice(&self.sflag.to_le_bytes());
        out.extend_from_slice(&self.access.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
        out.extend_from_slice(&self.path_len.to_le_bytes());
        out.push(self.eflag);
        out.push(self.extra_type);
        out.extend_from_slice(&self.extra_len.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self, WireError> {
        wire::require(bytes, Self::SIZE)?;
        let msg_type = wire::u16_at(bytes, 0);
        if msg_type != msg_type::IO_CONNECT {
            return Err(WireError::UnexpectedType {
                expected: "connect",
                found: msg_type,
            });
        }
        Ok(Self {
            msg_type,
            subtype: wire::u16_at(bytes, 2),
            file_type: wire::u32_at(bytes, 4),
            reply_max: wire::u16_at(bytes, 8),
            entry_max: wire::u16_at(bytes, 10),
            key: wire::u32_at(bytes, 12),
            handle: wire::u32_at(bytes, 16),
            ioflag: wire::u32_at(bytes, 20),
            mode: wire::u32_at(bytes, 24),
            sflag: wire::u16_at(bytes, 28),
            access: wire::u16_at(bytes, 30),
            reserved: wire::u16_at(bytes, 32),
            path_len: wire::u16_at(bytes, 34),
            eflag: wire::u8_at(bytes, 36),
            extra_type: wire::u8_at(bytes, 37),
            extra_len: wire::u16_at(bytes, 38),
        })
    }
}

fn length_field(field: &'static str, len: usize) -> Result<u16, WireError> {
    u16::try_from(len).map_err(|_| WireError::TooLong {
        field,
        len,
        max: u16::MAX as usize,
    })
}

/// A connect request: header, NUL-terminated path, extra data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectMessage {
    pub header: ConnectHeader,
    pub path: String,
    pub extra: Vec<u8>,
}

impl ConnectMessage {
    /// Builds a connect message; `path_len` and `extra_len` are filled in
    ///
    /// Fails when the terminated path or the extra data does not fit a
    /// 16-bit length field.
    pub fn new(
        mut header: ConnectHeader,
        path: impl Into<String>,
        extra: Vec<u8>,
    ) -> Result<Self, WireError> {
        let path = path.into();
        header.path_len = length_field("path", path.len() + 1)?;
        header.extra_len = length_field("extra", extra.len())?;
        Ok(Self {
            header,
            path,
            extra,
        })
    }

    /// Encodes header, path with its terminator, then extra data
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ConnectHeader::SIZE + self.path.len() + 1 + self.extra.len());
        self.header.write_to(&mut out);
        out.extend_from_slice(self.path.as_bytes());
        out.push(0);
        out.extend_from_slice(&self.extra);
        out
    }

    /// Decodes a full connect message
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let header = ConnectHeader::read_from(bytes)?;
        let path_start = ConnectHeader::SIZE;
        let path_end = path_start + header.path_len as usize;
        let extra_end = path_end + header.extra_len as usize;
        wire::require(bytes, extra_end)?;

        let raw_path = &bytes[path_start..path_end];
        let raw_path = match raw_path.iter().position(|b| *b == 0) {
            Some(nul) => &raw_path[..nul],
            None => raw_path,
        };
        let path = std::str::from_utf8(raw_path)
            .map_err(|_| WireError::InvalidPath)?
            .to_string();

        Ok(Self {
            header,
            path,
            extra: bytes[path_end..extra_end].to_vec(),
        })
    }
}

/// Header of read and write requests (`io_read_t` / `io_write_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IoHeader {
    pub msg_type: u16,
    pub combine_len: u16,
    pub nbytes: u32,
    pub xtype: u32,
    pub reserved: u32,
}

impl IoHeader {
    /// Creates a header for `msg_type` transferring `nbytes`
    pub fn new(msg_type: u16, nbytes: u32) -> Self {
        Self {
            msg_type,
            combine_len: Self::SIZE as u16,
            nbytes,
            xtype: 0,
            reserved: 0,
        }
    }
}

impl WireRecord for IoHeader {
    const SIZE: usize = 16;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.msg_type.to_le_bytes());
        out.extend_from_slice(&self.combine_len.to_le_bytes());
        out.extend_from_slice(&self.nbytes.to_le_bytes());
        out.extend_from_slice(&self.xtype.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self, WireError> {
        wire::require(bytes, Self::SIZE)?;
        Ok(Self {
            msg_type: wire::u16_at(bytes, 0),
            combine_len: wire::u16_at(bytes, 2),
            nbytes: wire::u32_at(bytes, 4),
            xtype: wire::u32_at(bytes, 8),
            reserved: wire::u32_at(bytes, 12),
        })
    }
}

/// Header of stat requests (`io_stat_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatHeader {
    pub msg_type: u16,
    pub combine_len: u16,
    pub reserved: u32,
}

impl Default for StatHeader {
    fn default() -> Self {
        Self {
            msg_type: msg_type::IO_STAT,
            combine_len: Self::SIZE as u16,
            reserved: 0,
        }
    }
}

impl WireRecord for StatHeader {
    const SIZE: usize = 8;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.msg_type.to_le_bytes());
        out.extend_from_slice(&self.combine_len.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self, WireError> {
        wire::require(bytes, Self::SIZE)?;
        Ok(Self {
            msg_type: wire::u16_at(bytes, 0),
            combine_len: wire::u16_at(bytes, 2),
            reserved: wire::u32_at(bytes, 4),
        })
    }
}

/// Header of device-control requests (`io_devctl_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevctlHeader {
    pub msg_type: u16,
    pub combine_len: u16,
    pub dcmd: i32,
    pub nbytes: i32,
    pub reserved: i32,
}

impl DevctlHeader {
    /// Creates a devctl header for command `dcmd` with `nbytes` of data
    pub fn new(dcmd: i32, nbytes: i32) -> Self {
        Self {
            msg_type: msg_type::IO_DEVCTL,
            combine_len: Self::SIZE as u16,
            dcmd,
            nbytes,
            reserved: 0,
        }
    }
}

impl WireRecord for DevctlHeader {
    const SIZE: usize = 16;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.msg_type.to_le_bytes());
        out.extend_from_slice(&self.combine_len.to_le_bytes());
        out.extend_from_slice(&self.dcmd.to_le_bytes());
        out.extend_from_slice(&self.nbytes.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self, WireError> {
        wire::require(bytes, Self::SIZE)?;
        Ok(Self {
            msg_type: wire::u16_at(bytes, 0),
            combine_len: wire::u16_at(bytes, 2),
            dcmd: wire::i32_at(bytes, 4),
            nbytes: wire::i32_at(bytes, 8),
            reserved: wire::i32_at(bytes, 12),
        })
    }
}

/// Seek origin
pub mod whence {
    pub const SEEK_SET: i16 = 0;
    pub const SEEK_CUR: i16 = 1;
    pub const SEEK_END: i16 = 2;
}

/// Header of seek requests (`io_lseek_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LseekHeader {
    pub msg_type: u16,
    pub combine_len: u16,
    pub whence: i16,
    pub reserved: u16,
    pub offset: i64,
}

impl LseekHeader {
    /// Creates a seek header
    pub fn new(offset: i64, whence: i16) -> Self {
        Self {
            msg_type: msg_type::IO_LSEEK,
            combine_len: Self::SIZE as u16,
            whence,
            reserved: 0,
            offset,
        }
    }
}

impl WireRecord for LseekHeader {
    const SIZE: usize = 16;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.msg_type.to_le_bytes());
        out.extend_from_slice(&self.combine_len.to_le_bytes());
        out.extend_from_slice(&self.whence.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self, WireError> {
        wire::require(bytes, Self::SIZE)?;
        Ok(Self {
            msg_type: wire::u16_at(bytes, 0),
            combine_len: wire::u16_at(bytes, 2),
            whence: wire::i16_at(bytes, 4),
            reserved: wire::u16_at(bytes, 6),
            offset: wire::i64_at(bytes, 8),
        })
    }
}

/// Header of close requests (`io_close_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseHeader {
    pub msg_type: u16,
    pub combine_len: u16,
}

impl Default for CloseHeader {
    fn default() -> Self {
        Self {
            msg_type: msg_type::IO_CLOSE,
            combine_len: Self::SIZE as u16,
        }
    }
}

impl WireRecord for CloseHeader {
    const SIZE: usize = 4;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.msg_type.to_le_bytes());
        out.extend_from_slice(&self.combine_len.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self, WireError> {
        wire::require(bytes, Self::SIZE)?;
        Ok(Self {
            msg_type: wire::u16_at(bytes, 0),
            combine_len: wire::u16_at(bytes, 2),
        })
    }
}
