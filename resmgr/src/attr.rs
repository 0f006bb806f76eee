//! Resource attributes (`iofunc_attr_t`)
//!
//! One attribute record describes the resource a manager serves. Sessions
//! count themselves in and out of it; handlers update everything else.

use crate::ResmgrError;
use core_types::ThreadId;
use ipc::stat::mode;
use ipc::StatRecord;
use serde::{Deserialize, Serialize};

/// Permission bits granting read to anyone
const ANY_READ: u32 = 0o444;
/// Permission bits granting write to anyone
const ANY_WRITE: u32 = 0o222;

/// Shared metadata of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
    /// Open sessions
    pub count: u32,
    /// Sessions open for reading
    pub rcount: u32,
    /// Sessions open for writing
    pub wcount: u32,
    /// Thread holding the resource lock
    pub lock_tid: Option<ThreadId>,
    pub lock_count: u32,
    pub size: i64,
    pub mtime: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mode: u32,
    pub nlink: u32,
    pub uid: i32,
    pub gid: i32,
    pub inode: u64,
    pub dev: u32,
    pub rdev: u32,
}

impl Attr {
    /// Creates attributes for a resource of the given mode
    pub fn new(mode: u32) -> Self {
        Self {
            count: 0,
            rcount: 0,
            wcount: 0,
            lock_tid: None,
            lock_count: 0,
            size: 0,
            mtime: 0,
            atime: 0,
            ctime: 0,
            mode,
            nlink: 1,
            uid: 0,
            gid: 0,
            inode: 1,
            dev: 0,
            rdev: 0,
        }
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    /// Sets all three timestamps
    pub fn stamp(&mut self, now: u32) {
        self.mtime = now;
        self.atime = now;
        self.ctime = now;
    }

    /// True while any session is open on the resource
    pub fn is_referenced(&self) -> bool {
        self.count > 0
    }

    /// Checks `read`/`write` access against the mode bits
    pub fn check_access(&self, read: bool, write: bool) -> Result<(), ResmgrError> {
        if read && self.mode & ANY_READ == 0 {
            return Err(ResmgrError::AccessDenied);
        }
        if write && self.mode & ANY_WRITE == 0 {
            return Err(ResmgrError::AccessDenied);
        }
        Ok(())
    }

    pub(crate) fn add_session(&mut self, read: bool, write: bool) {
        self.count += 1;
        if read {
            self.rcount += 1;
        }
        if write {
            self.wcount += 1;
        }
    }

    pub(crate) fn remove_session(&mut self, read: bool, write: bool) {
        self.count = self.count.saturating_sub(1);
        if read {
            self.rcount = self.rcount.saturating_sub(1);
        }
        if write {
            self.wcount = self.wcount.saturating_sub(1);
        }
    }

    /// Takes the resource lock for `tid`; re-entrant for the holder
    pub fn lock(&mut self, tid: ThreadId) -> Result<u32, ResmgrError> {
        match self.lock_tid {
            Some(owner) if owner != tid => Err(ResmgrError::Busy),
            _ => {
                self.lock_tid = Some(tid);
                self.lock_count += 1;
                Ok(self.lock_count)
            }
        }
    }

    /// Releases one level of the resource lock held by `tid`
    pub fn unlock(&mut self, tid: ThreadId) -> Result<u32, ResmgrError> {
        if self.lock_tid != Some(tid) {
            return Err(ResmgrError::InvalidArgument(format!("{} does not hold the lock", tid)));
        }
        self.lock_count -= 1;
        if self.lock_count == 0 {
            self.lock_tid = None;
        }
        Ok(self.lock_count)
    }

    /// Snapshot as a stat record
    pub fn to_stat(&self) -> StatRecord {
        StatRecord {
            ino: self.inode,
            size: self.size,
            dev: self.dev,
            rdev: self.rdev,
            uid: self.uid,
            gid: self.gid,
            mtime: self.mtime,
            atime: self.atime,
            ctime: self.ctime,
            mode: self.mode,
            nlink: self.nlink,
            blocksize: 512,
            nblocks: ((self.size + 511) / 512) as i32,
            blksize: 512,
            blocks: ((self.size + 511) / 512) as u64,
        }
    }
}

impl Default for Attr {
    /// A character device readable and writable by anyone
    fn default() -> Self {
        Self::new(mode::S_IFCHR | 0o666)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut attr = Attr::default();
        attr.add_session(true, false);
        attr.add_session(true, true);
        assert_eq!((attr.count, attr.rcount, attr.wcount), (2, 2, 1));
        attr.remove_session(true, true);
        assert_eq!((attr.count, attr.rcount, attr.wcount), (1, 1, 0));
        assert!(attr.is_referenced());
    }

    #[test]
    fn test_access_check() {
        let read_only = Attr::new(mode::S_IFCHR | 0o444);
        assert!(read_only.check_access(true, false).is_ok());
        assert!(matches!(
            read_only.check_access(false, true),
            Err(ResmgrError::AccessDenied)
        ));
    }

    #[test]
    fn test_lock_is_reentrant_for_owner() {
        let mut attr = Attr::default();
        let owner = ThreadId::from_raw(1);
        let other = ThreadId::from_raw(2);
        assert_eq!(attr.lock(owner).unwrap(), 1);
        assert_eq!(attr.lock(owner).unwrap(), 2);
        assert!(matches!(attr.lock(other), Err(ResmgrError::Busy)));
        assert!(attr.unlock(other).is_err());
        attr.unlock(owner).unwrap();
        assert_eq!(attr.unlock(owner).unwrap(), 0);
        assert_eq!(attr.lock_tid, None);
    }

    #[test]
    fn test_stat_snapshot() {
        let mut attr = Attr::default().with_size(1024);
        attr.stamp(1_700_000_000);
        let stat = attr.to_stat();
        assert_eq!(stat.size, 1024);
        assert_eq!(stat.mtime, 1_700_000_000);
        assert_eq!(stat.blocks, 2);
        assert_eq!(stat.mode & mode::S_IFMT, mode::S_IFCHR);
    }
}
