//! Default handlers (`iofunc_*_default`)
//!
//! A manager built without overrides answers open, close, stat, lseek, the
//! ocb lock pair and io unblock with these. Read and write have no default;
//! [`read_bytes`] and [`write_verify`] cover the common parts.

use crate::{ConnectRequest, HandlerContext, IoRequest, Outcome, ResmgrError};
use core_types::errno;
use ipc::{whence, IoHeader, LseekHeader, Payload};
use kernel_api::KernelApi;

/// Opens a session on the resource itself
///
/// The manager serves a single resource, so any path below the mount point
/// is reported missing.
pub fn open<K: KernelApi, S>(
    hc: &mut HandlerContext<'_, K, S>,
    request: &ConnectRequest,
) -> Result<Outcome, ResmgrError> {
    if !request.path().is_empty() {
        return Err(ResmgrError::NotFound(request.path().to_string()));
    }
    hc.open_session(request.ioflag(), request.header().sflag)?;
    Ok(Outcome::ok())
}

pub fn close<K: KernelApi, S>(
    hc: &mut HandlerContext<'_, K, S>,
    _request: &IoRequest,
) -> Result<Outcome, ResmgrError> {
    hc.close_session()?;
    Ok(Outcome::ok())
}

/// Replies with the attributes as a stat record
pub fn stat<K: KernelApi, S>(
    hc: &mut HandlerContext<'_, K, S>,
    _request: &IoRequest,
) -> Result<Outcome, ResmgrError> {
    Ok(Outcome::reply(Payload::record(&hc.attr.to_stat())))
}

/// Moves the session offset; replies with the new offset as an `i64`
pub fn lseek<K: KernelApi, S>(
    hc: &mut HandlerContext<'_, K, S>,
    request: &IoRequest,
) -> Result<Outcome, ResmgrError> {
    let header: LseekHeader = request.header()?;
    let size = hc.attr.size;
    let ocb = hc.ocb_mut()?;
    let base = match header.whence {
        whence::SEEK_SET => 0,
        whence::SEEK_CUR => ocb.offset,
        whence::SEEK_END => size,
        other => {
            return Err(ResmgrError::InvalidArgument(format!("whence {}", other)));
        }
    };
    let offset = base
        .checked_add(header.offset)
        .filter(|offset| *offset >= 0)
        .ok_or_else(|| ResmgrError::InvalidArgument(format!("offset {}", header.offset)))?;
    ocb.offset = offset;
    Ok(Outcome::reply(Payload::bytes(offset.to_le_bytes())))
}

/// Takes the resource lock for the requesting thread
pub fn lock_ocb<K: KernelApi, S>(
    hc: &mut HandlerContext<'_, K, S>,
    _request: &IoRequest,
) -> Result<Outcome, ResmgrError> {
    hc.ocb()?;
    hc.attr.lock(hc.ctx.info.tid)?;
    hc.ocb_mut()?.locked += 1;
    Ok(Outcome::ok())
}

pub fn unlock_ocb<K: KernelApi, S>(
    hc: &mut HandlerContext<'_, K, S>,
    _request: &IoRequest,
) -> Result<Outcome, ResmgrError> {
    if hc.ocb()?.locked == 0 {
        return Err(ResmgrError::InvalidArgument("session holds no lock".to_string()));
    }
    hc.attr.unlock(hc.ctx.info.tid)?;
    hc.ocb_mut()?.locked -= 1;
    Ok(Outcome::ok())
}

/// Fails the pending request with `EINTR`
pub fn unblock<K: KernelApi, S>(
    _hc: &mut HandlerContext<'_, K, S>,
    _request: &IoRequest,
) -> Result<Outcome, ResmgrError> {
    Ok(Outcome::Error(errno::EINTR))
}

/// Checks that the session may be read
pub fn read_verify<K: KernelApi, S>(hc: &HandlerContext<'_, K, S>) -> Result<(), ResmgrError> {
    if hc.ocb()?.readable() {
        Ok(())
    } else {
        Err(ResmgrError::NotOpenFor("reading"))
    }
}

/// Checks that the session may be written
pub fn write_verify<K: KernelApi, S>(hc: &HandlerContext<'_, K, S>) -> Result<(), ResmgrError> {
    if hc.ocb()?.writable() {
        Ok(())
    } else {
        Err(ResmgrError::NotOpenFor("writing"))
    }
}

/// Serves a read from `data` at the session offset
///
/// Replies with up to `nbytes` bytes, the count as status, and advances the
/// offset by what was sent. Reading past the end returns nothing.
pub fn read_bytes<K: KernelApi, S>(
    hc: &mut HandlerContext<'_, K, S>,
    request: &IoRequest,
    data: &[u8],
) -> Result<Outcome, ResmgrError> {
    read_verify(hc)?;
    let header: IoHeader = request.header()?;
    let now = hc.now();
    let ocb = hc.ocb_mut()?;
    let start = (ocb.offset.max(0) as usize).min(data.len());
    let end = start.saturating_add(header.nbytes as usize).min(data.len());
    ocb.offset += (end - start) as i64;
    hc.attr.atime = now;
    Ok(Outcome::Reply {
        status: (end - start) as i32,
        payload: Payload::bytes(&data[start..end]),
    })
}
