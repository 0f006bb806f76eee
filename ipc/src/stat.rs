//! File status record returned by stat replies

use crate::error::WireError;
use crate::wire::{self, WireRecord};
use serde::{Deserialize, Serialize};

/// Mode bits for the file type
pub mod mode {
    pub const S_IFMT: u32 = 0o170000;
    pub const S_IFDIR: u32 = 0o040000;
    pub const S_IFCHR: u32 = 0o020000;
    pub const S_IFREG: u32 = 0o100000;
    pub const S_IFNAM: u32 = 0o050000;
}

/// Snapshot of a resource's attributes (`struct stat`)
///
/// Layout (72 bytes, little-endian): `u64 ino, i64 size, u32 dev, u32 rdev,
/// i32 uid, i32 gid, u32 mtime, u32 atime, u32 ctime, u32 mode, u32 nlink,
/// u32 blocksize, i32 nblocks, u32 blksize, u64 blocks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatRecord {
    pub ino: u64,
    pub size: i64,
    pub dev: u32,
    pub rdev: u32,
    pub uid: i32,
    pub gid: i32,
    pub mtime: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mode: u32,
    pub nlink: u32,
    pub blocksize: u32,
    pub nblocks: i32,
    pub blksize: u32,
    pub blocks: u64,
}

impl StatRecord {
    /// True when the mode describes a directory
    pub fn is_dir(&self) -> bool {
        self.mode & mode::S_IFMT == mode::S_IFDIR
    }
}

impl WireRecord for StatRecord {
    const SIZE: usize = 72;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.ino.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.dev.to_le_bytes());
        out.extend_from_slice(&self.rdev.to_le_bytes());
        out.extend_from_slice(&self.uid.to_le_bytes());
        out.extend_from_slice(&self.gid.to_le_bytes());
        out.extend_from_slice(&self.mtime.to_le_bytes());
        out.extend_from_slice(&self.atime.to_le_bytes());
        out.extend_from_slice(&self.ctime.to_le_bytes());
        out.extend_from_slice(&self.mode.to_le_bytes());
        out.extend_from_slice(&self.nlink.to_le_bytes());
        out.extend_from_slice(&self.blocksize.to_le_bytes());
        out.extend_from_slice(&self.nblocks.to_le_bytes());
        out.extend_from_slice(&self.blksize.to_le_bytes());
        out.extend_from_slice(&self.blocks.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self, WireError> {
        wire::require(bytes, Self::SIZE)?;
        Ok(Self {
            ino: wire::u64_at(bytes, 0),
            size: wire::i64_at(bytes, 8),
            dev: wire::u32_at(bytes, 16),
            rdev: wire::u32_at(bytes, 20),
            uid: wire::i32_at(bytes, 24),
            gid: wire::i32_at(bytes, 28),
            mtime: wire::u32_at(bytes, 32),
            atime: wire::u32_at(bytes, 36),
            ctime: wire::u32_at(bytes, 40),
            mode: wire::u32_at(bytes, 44),
            nlink: wire::u32_at(bytes, 48),
            blocksize: wire::u32_at(bytes, 52),
            nblocks: wire::i32_at(bytes, 56),
            blksize: wire::u32_at(bytes, 60),
            blocks: wire::u64_at(bytes, 64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_record_size_and_offsets() {
        let record = StatRecord {
            size: 1024,
            mode: mode::S_IFCHR | 0o666,
            nlink: 1,
            ..Default::default()
        };
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), StatRecord::SIZE);
        assert_eq!(&bytes[8..16], &1024i64.to_le_bytes());
        assert_eq!(StatRecord::read_from(&bytes).unwrap(), record);
    }

    #[test]
    fn test_stat_record_is_dir() {
        let dir = StatRecord {
            mode: mode::S_IFDIR | 0o755,
            ..Default::default()
        };
        assert!(dir.is_dir());
        assert!(!StatRecord::default().is_dir());
    }
}
