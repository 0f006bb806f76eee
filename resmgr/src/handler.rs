//! Handler contract
//!
//! Every handler gets a [`HandlerContext`] and returns an [`Outcome`]. A
//! handler error is turned into an error reply carrying
//! [`ResmgrError::errno`], so a client is never left blocked by a failing
//! handler unless the handler explicitly asked for [`Outcome::NoReply`].

use crate::session::OpenRequest;
use crate::{Attr, ConnectRequest, Context, IoRequest, Ocb, ResmgrError, SessionArena, SessionKey};
use ipc::{Payload, Pulse};
use kernel_api::KernelApi;
use messaging::Messenger;
use std::sync::Arc;

/// What the dispatcher sends back after a handler ran
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Reply with a status and a payload
    Reply { status: i32, payload: Payload },
    /// Reply with an error number
    Error(i32),
    /// The handler replied itself, or will reply later
    NoReply,
    /// Reply status `-1` and stop dispatching
    Stop,
}

impl Outcome {
    /// Status zero with an empty body
    pub fn ok() -> Self {
        Outcome::status(0)
    }

    pub fn status(status: i32) -> Self {
        Outcome::Reply {
            status,
            payload: Payload::empty(),
        }
    }

    /// Status zero with `payload`
    pub fn reply(payload: Payload) -> Self {
        Outcome::Reply { status: 0, payload }
    }
}

/// Whether dispatching goes on after a pulse handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// Builds the manager's data for a new session
pub type SessionInit<S> = Box<dyn Fn(SessionKey) -> S + Send>;

pub type ConnectHandler<K, S> =
    Box<dyn FnMut(&mut HandlerContext<'_, K, S>, &ConnectRequest) -> Result<Outcome, ResmgrError> + Send>;

pub type IoHandler<K, S> =
    Box<dyn FnMut(&mut HandlerContext<'_, K, S>, &IoRequest) -> Result<Outcome, ResmgrError> + Send>;

pub type PulseHandler<K, S> =
    Box<dyn FnMut(&mut HandlerContext<'_, K, S>, &Pulse) -> Result<Control, ResmgrError> + Send>;

/// Everything a handler may touch while serving one request
pub struct HandlerContext<'a, K: KernelApi, S> {
    pub ctx: Context,
    pub attr: &'a mut Attr,
    pub sessions: &'a mut SessionArena<S>,
    /// Session bound to the requesting connection, if any
    pub session: Option<SessionKey>,
    pub(crate) messenger: &'a Messenger<K>,
    pub(crate) session_init: &'a SessionInit<S>,
}

impl<'a, K: KernelApi, S> HandlerContext<'a, K, S> {
    pub fn kernel(&self) -> &Arc<K> {
        self.messenger.kernel()
    }

    pub fn messenger(&self) -> &Messenger<K> {
        self.messenger
    }

    /// Kernel time in whole seconds, as stored in the attribute timestamps
    pub fn now(&self) -> u32 {
        self.messenger.kernel().now().as_secs_u32()
    }

    /// Replies right away; the handler should then return [`Outcome::NoReply`]
    pub fn reply(&self, status: i32, payload: &Payload) -> Result<(), ResmgrError> {
        self.messenger.reply(self.ctx.rcvid, status, Some(payload), None)?;
        Ok(())
    }

    /// Opens a session for the requesting connection
    pub fn open_session(&mut self, ioflag: u32, sflag: u16) -> Result<SessionKey, ResmgrError> {
        let request = OpenRequest {
            scoid: self.ctx.info.scoid,
            coid: self.ctx.info.coid,
            ioflag,
            sflag,
        };
        let init = self.session_init;
        let key = self.sessions.open(&mut *self.attr, request, |key| init(key))?;
        self.session = Some(key);
        Ok(key)
    }

    /// Closes the bound session
    pub fn close_session(&mut self) -> Result<Ocb<S>, ResmgrError> {
        let key = self.session.take().ok_or(ResmgrError::NoSession)?;
        self.sessions.close(&mut *self.attr, key)
    }

    /// The bound session
    pub fn ocb(&self) -> Result<&Ocb<S>, ResmgrError> {
        let key = self.session.ok_or(ResmgrError::NoSession)?;
        self.sessions.get(key).ok_or(ResmgrError::UnknownSession(key))
    }

    pub fn ocb_mut(&mut self) -> Result<&mut Ocb<S>, ResmgrError> {
        let key = self.session.ok_or(ResmgrError::NoSession)?;
        self.sessions
            .get_mut(key)
            .ok_or(ResmgrError::UnknownSession(key))
    }
}
