//! Open sessions (OCBs)
//!
//! Sessions live in an arena keyed by [`SessionKey`]. Each one is bound to
//! the client connection that opened it, so io requests find their session
//! by `(scoid, coid)` and a disconnect can release everything a client
//! left open.

use crate::{Attr, ResmgrError};
use core_types::{ConnectionId, ServerConnectionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Open for reading
pub const IOFLAG_READ: u32 = 0x1;
/// Open for writing
pub const IOFLAG_WRITE: u32 = 0x2;

/// Stable handle of an open session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionKey(u32);

impl SessionKey {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

/// Per-open state (`iofunc_ocb_t`) plus the manager's own data
#[derive(Debug, Clone)]
pub struct Ocb<S> {
    pub key: SessionKey,
    pub scoid: ServerConnectionId,
    pub coid: ConnectionId,
    pub ioflag: u32,
    /// Current read/write position
    pub offset: i64,
    pub sflag: u16,
    /// Lock depth taken through this session
    pub locked: u32,
    pub user: S,
}

impl<S> Ocb<S> {
    pub fn readable(&self) -> bool {
        self.ioflag & IOFLAG_READ != 0
    }

    pub fn writable(&self) -> bool {
        self.ioflag & IOFLAG_WRITE != 0
    }
}

/// What a session needs to be created
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest {
    pub scoid: ServerConnectionId,
    pub coid: ConnectionId,
    pub ioflag: u32,
    pub sflag: u16,
}

/// All open sessions of one resource
#[derive(Debug)]
pub struct SessionArena<S> {
    sessions: BTreeMap<SessionKey, Ocb<S>>,
    bindings: BTreeMap<(ServerConnectionId, ConnectionId), SessionKey>,
    next_key: u32,
}

impl<S> SessionArena<S> {
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            bindings: BTreeMap::new(),
            next_key: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Opens a session on `attr`
    ///
    /// Access is checked against the mode first; on success the attribute
    /// counts are bumped and `init` builds the manager's per-session data.
    /// A connection that already has a session is refused with
    /// [`ResmgrError::Busy`] until that session closes.
    pub fn open(
        &mut self,
        attr: &mut Attr,
        request: OpenRequest,
        init: impl FnOnce(SessionKey) -> S,
    ) -> Result<SessionKey, ResmgrError> {
        if let Some(existing) = self.lookup(request.scoid, request.coid) {
            log::warn!("{} already holds {}", request.coid, existing);
            return Err(ResmgrError::Busy);
        }
        let read = request.ioflag & IOFLAG_READ != 0;
        let write = request.ioflag & IOFLAG_WRITE != 0;
        attr.check_access(read, write)?;

        let key = SessionKey(self.next_key);
        self.next_key += 1;
        let ocb = Ocb {
            key,
            scoid: request.scoid,
            coid: request.coid,
            ioflag: request.ioflag,
            offset: 0,
            sflag: request.sflag,
            locked: 0,
            user: init(key),
        };
        attr.add_session(read, write);
        self.bindings.insert((request.scoid, request.coid), key);
        self.sessions.insert(key, ocb);
        log::debug!("opened {} for {} ioflag {:#x}", key, request.coid, request.ioflag);
        Ok(key)
    }

    /// Closes a session and returns its data
    ///
    /// Locks still held through the session are dropped with it.
    pub fn close(&mut self, attr: &mut Attr, key: SessionKey) -> Result<Ocb<S>, ResmgrError> {
        let ocb = self
            .sessions
            .remove(&key)
            .ok_or(ResmgrError::UnknownSession(key))?;
        let binding = (ocb.scoid, ocb.coid);
        if self.bindings.get(&binding) == Some(&key) {
            self.bindings.remove(&binding);
        }
        attr.remove_session(ocb.readable(), ocb.writable());
        if ocb.locked > 0 && attr.lock_count >= ocb.locked {
            attr.lock_count -= ocb.locked;
            if attr.lock_count == 0 {
                attr.lock_tid = None;
            }
        }
        log::debug!("closed {}", key);
        Ok(ocb)
    }

    /// Session bound to a client connection
    pub fn lookup(&self, scoid: ServerConnectionId, coid: ConnectionId) -> Option<SessionKey> {
        self.bindings.get(&(scoid, coid)).copied()
    }

    pub fn get(&self, key: SessionKey) -> Option<&Ocb<S>> {
        self.sessions.get(&key)
    }

    pub fn get_mut(&mut self, key: SessionKey) -> Option<&mut Ocb<S>> {
        self.sessions.get_mut(&key)
    }

    /// Closes every session opened over `scoid`
    pub fn close_all_for(&mut self, attr: &mut Attr, scoid: ServerConnectionId) -> Vec<Ocb<S>> {
        let keys: Vec<SessionKey> = self
            .sessions
            .values()
            .filter(|ocb| ocb.scoid == scoid)
            .map(|ocb| ocb.key)
            .collect();
        keys.into_iter()
            .filter_map(|key| self.close(attr, key).ok())
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = SessionKey> + '_ {
        self.sessions.keys().copied()
    }
}

impl<S> Default for SessionArena<S> {
    fn default() -> Self {
        Self::new()
    }
}
