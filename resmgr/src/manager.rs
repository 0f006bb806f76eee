//! Dispatch engine
//!
//! A [`ResourceManager`] owns a channel attached under a path, the
//! attribute record of the resource it serves, the open sessions, and three
//! handler tables: connect handlers by [`ConnectOp`], io handlers by
//! [`IoOp`] and pulse handlers by code. Tables are filled through
//! [`ResourceManagerBuilder`] and can only grow until dispatching starts.
//!
//! Each [`ResourceManager::dispatch_once`] takes one item off the channel:
//!
//! 1. A pulse never reaches the connect or io tables. Disconnect pulses
//!    release the sessions of the departing client, unblock pulses fail the
//!    interrupted request with `EINTR`, then the handler registered for the
//!    code (if any) runs.
//! 2. A connect message is decoded into a [`ConnectRequest`] and handed to
//!    the connect handler for its subtype.
//! 3. An io message is handed to the io handler for its type, together with
//!    the session bound to the sending connection.
//!
//! Anything without a handler is answered with `ENOSYS`.

use crate::error::{connect_op, io_op};
use crate::handler::{ConnectHandler, IoHandler, PulseHandler, SessionInit};
use crate::{
    defaults, Attr, ConnectOp, ConnectRequest, Context, Control, HandlerContext, IoOp, IoRequest,
    Outcome, RegistrationError, ResmgrAttr, ResmgrError, SessionArena, SessionKey,
};
use core_types::{errno, ReceiveId};
use event_bridge::BridgeEvent;
use ipc::{msg_type, peek_type, ConnectMessage, EncodingMode, MsgInfo, Payload, Pulse};
use kernel_api::{ChannelFlags, KernelApi, PathId};
use messaging::{Messenger, Received, TransportConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle of a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Built; handlers may still be added
    Initialized,
    /// At least one request has been dispatched
    Dispatching,
    /// Stopped by a handler or shut down
    Terminated,
}

/// What happened to a request after its handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Replied(i32),
    Errored(i32),
    NoReply,
    Stopped,
}

/// One dispatched item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Connect { op: ConnectOp, disposition: Disposition },
    Io { op: IoOp, disposition: Disposition },
    Pulse(BridgeEvent),
    /// A message no table knows; answered with an error
    Unsupported { msg_type: u16 },
}

/// Counters of a manager's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub connects: u64,
    pub ios: u64,
    pub pulses: u64,
    pub unsupported: u64,
    /// Requests whose handler failed
    pub errors: u64,
    /// Replies the kernel refused
    pub failed_replies: u64,
}

/// Collects handlers and settings for a [`ResourceManager`]
pub struct ResourceManagerBuilder<K: KernelApi, S> {
    kernel: Arc<K>,
    path: String,
    attr: Attr,
    resmgr_attr: ResmgrAttr,
    session_init: SessionInit<S>,
    connect_table: BTreeMap<ConnectOp, ConnectHandler<K, S>>,
    io_table: BTreeMap<IoOp, IoHandler<K, S>>,
    pulse_table: BTreeMap<i8, PulseHandler<K, S>>,
    diagnostics: Vec<RegistrationError>,
}

impl<K: KernelApi + 'static, S: Default + 'static> ResourceManagerBuilder<K, S> {
    /// Starts a manager for `path` with the default handlers installed
    pub fn new(kernel: Arc<K>, path: &str) -> Self {
        let mut builder = Self {
            kernel,
            path: path.to_string(),
            attr: Attr::default(),
            resmgr_attr: ResmgrAttr::default(),
            session_init: Box::new(|_| S::default()),
            connect_table: BTreeMap::new(),
            io_table: BTreeMap::new(),
            pulse_table: BTreeMap::new(),
            diagnostics: Vec::new(),
        };
        builder.connect_table.insert(ConnectOp::Open, Box::new(defaults::open::<K, S>));
        builder.io_table.insert(IoOp::Close, Box::new(defaults::close::<K, S>));
        builder.io_table.insert(IoOp::CloseDup, Box::new(defaults::close::<K, S>));
        builder.io_table.insert(IoOp::Stat, Box::new(defaults::stat::<K, S>));
        builder.io_table.insert(IoOp::Lseek, Box::new(defaults::lseek::<K, S>));
        builder.io_table.insert(IoOp::LockOcb, Box::new(defaults::lock_ocb::<K, S>));
        builder.io_table.insert(IoOp::UnlockOcb, Box::new(defaults::unlock_ocb::<K, S>));
        builder.io_table.insert(IoOp::Unblock, Box::new(defaults::unblock::<K, S>));
        builder
    }
}

impl<K: KernelApi + 'static, S: 'static> ResourceManagerBuilder<K, S> {
    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attr = attr;
        self
    }

    pub fn with_resmgr_attr(mut self, resmgr_attr: ResmgrAttr) -> Self {
        self.resmgr_attr = resmgr_attr;
        self
    }

    /// Sets the hook that builds per-session data when a session opens
    pub fn with_session_init<F>(mut self, init: F) -> Self
    where
        F: Fn(SessionKey) -> S + Send + 'static,
    {
        self.session_init = Box::new(init);
        self
    }

    /// Handles connect requests of kind `op`, replacing any default
    pub fn on_connect<F>(mut self, op: ConnectOp, handler: F) -> Self
    where
        F: FnMut(&mut HandlerContext<'_, K, S>, &ConnectRequest) -> Result<Outcome, ResmgrError>
            + Send
            + 'static,
    {
        self.connect_table.insert(op, Box::new(handler));
        self
    }

    /// Handles io requests of kind `op`, replacing any default
    pub fn on_io<F>(mut self, op: IoOp, handler: F) -> Self
    where
        F: FnMut(&mut HandlerContext<'_, K, S>, &IoRequest) -> Result<Outcome, ResmgrError>
            + Send
            + 'static,
    {
        self.io_table.insert(op, Box::new(handler));
        self
    }

    /// Handles pulses with `code`
    pub fn on_pulse<F>(mut self, code: i8, handler: F) -> Self
    where
        F: FnMut(&mut HandlerContext<'_, K, S>, &Pulse) -> Result<Control, ResmgrError>
            + Send
            + 'static,
    {
        self.pulse_table.insert(code, Box::new(handler));
        self
    }

    /// Registers a connect handler by name
    ///
    /// A name that is not a connect operation is recorded as a diagnostic
    /// and the handler is dropped; building goes on.
    pub fn register_connect<F>(self, name: &str, handler: F) -> Self
    where
        F: FnMut(&mut HandlerContext<'_, K, S>, &ConnectRequest) -> Result<Outcome, ResmgrError>
            + Send
            + 'static,
    {
        match connect_op(name) {
            Ok(op) => self.on_connect(op, handler),
            Err(err) => self.diagnose(err),
        }
    }

    /// Registers an io handler by name; see [`Self::register_connect`]
    pub fn register_io<F>(self, name: &str, handler: F) -> Self
    where
        F: FnMut(&mut HandlerContext<'_, K, S>, &IoRequest) -> Result<Outcome, ResmgrError>
            + Send
            + 'static,
    {
        match io_op(name) {
            Ok(op) => self.on_io(op, handler),
            Err(err) => self.diagnose(err),
        }
    }

    /// Registration problems seen so far
    pub fn diagnostics(&self) -> &[RegistrationError] {
        &self.diagnostics
    }

    fn diagnose(mut self, err: RegistrationError) -> Self {
        log::warn!("{}: {}", self.path, err);
        self.diagnostics.push(err);
        self
    }

    /// Creates the channel, attaches the path and stamps the attributes
    pub fn build(self) -> Result<ResourceManager<K, S>, ResmgrError> {
        let config = TransportConfig::raw().with_receive_buffer_len(self.resmgr_attr.msg_max_size);
        let mut messenger = Messenger::new(Arc::clone(&self.kernel), config);
        let chid = messenger
            .connector_mut()
            .create_channel(ChannelFlags::DISCONNECT | ChannelFlags::UNBLOCK)?;
        let path_id = match self.kernel.path_attach(&self.path, chid) {
            Ok(id) => id,
            Err(err) => {
                messenger.connector_mut().destroy_channel()?;
                return Err(err.into());
            }
        };

        let mut attr = self.attr;
        attr.stamp(self.kernel.now().as_secs_u32());
        log::info!("resource manager attached at {} on {}", self.path, chid);

        Ok(ResourceManager {
            path: self.path,
            path_id: Some(path_id),
            messenger,
            attr,
            resmgr_attr: self.resmgr_attr,
            sessions: SessionArena::new(),
            session_init: self.session_init,
            connect_table: self.connect_table,
            io_table: self.io_table,
            pulse_table: self.pulse_table,
            diagnostics: self.diagnostics,
            state: DispatchState::Initialized,
            stats: DispatchStats::default(),
        })
    }
}

/// A resource manager serving one path
pub struct ResourceManager<K: KernelApi, S> {
    path: String,
    path_id: Option<PathId>,
    messenger: Messenger<K>,
    attr: Attr,
    resmgr_attr: ResmgrAttr,
    sessions: SessionArena<S>,
    session_init: SessionInit<S>,
    connect_table: BTreeMap<ConnectOp, ConnectHandler<K, S>>,
    io_table: BTreeMap<IoOp, IoHandler<K, S>>,
    pulse_table: BTreeMap<i8, PulseHandler<K, S>>,
    diagnostics: Vec<RegistrationError>,
    state: DispatchState,
    stats: DispatchStats,
}

impl<K: KernelApi + 'static, S: Default + 'static> ResourceManager<K, S> {
    pub fn builder(kernel: Arc<K>, path: &str) -> ResourceManagerBuilder<K, S> {
        ResourceManagerBuilder::new(kernel, path)
    }
}

impl<K: KernelApi + 'static, S: 'static> ResourceManager<K, S> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn attr(&self) -> &Attr {
        &self.attr
    }

    pub fn attr_mut(&mut self) -> &mut Attr {
        &mut self.attr
    }

    pub fn resmgr_attr(&self) -> &ResmgrAttr {
        &self.resmgr_attr
    }

    pub fn sessions(&self) -> &SessionArena<S> {
        &self.sessions
    }

    pub fn messenger(&self) -> &Messenger<K> {
        &self.messenger
    }

    pub fn diagnostics(&self) -> &[RegistrationError] {
        &self.diagnostics
    }

    /// Adds a pulse handler (`AddPulse`)
    ///
    /// Only allowed before the first request is dispatched.
    pub fn add_pulse<F>(&mut self, code: i8, handler: F) -> Result<(), RegistrationError>
    where
        F: FnMut(&mut HandlerContext<'_, K, S>, &Pulse) -> Result<Control, ResmgrError>
            + Send
            + 'static,
    {
        if self.state != DispatchState::Initialized {
            return Err(RegistrationError::AlreadyDispatching);
        }
        self.pulse_table.insert(code, Box::new(handler));
        Ok(())
    }

    /// Adds an io handler before dispatching starts
    pub fn add_io<F>(&mut self, op: IoOp, handler: F) -> Result<(), RegistrationError>
    where
        F: FnMut(&mut HandlerContext<'_, K, S>, &IoRequest) -> Result<Outcome, ResmgrError>
            + Send
            + 'static,
    {
        if self.state != DispatchState::Initialized {
            return Err(RegistrationError::AlreadyDispatching);
        }
        self.io_table.insert(op, Box::new(handler));
        Ok(())
    }

    /// Receives one item and dispatches it
    pub fn dispatch_once(&mut self) -> Result<Dispatched, ResmgrError> {
        if self.state == DispatchState::Terminated {
            return Err(ResmgrError::Terminated);
        }
        self.state = DispatchState::Dispatching;

        let received = self.messenger.receive(0, Some(EncodingMode::Raw))?;
        match received {
            Received::Pulse { pulse, info } => self.dispatch_pulse(pulse, info),
            Received::Message {
                rcvid,
                len,
                payload,
                info,
            } => {
                let bytes = match payload {
                    Payload::Bytes(bytes) | Payload::FixedRecord(bytes) => bytes,
                    Payload::Structured(_) => Vec::new(),
                };
                self.dispatch_message(rcvid, len, bytes, info)
            }
        }
    }

    /// Dispatches until a handler stops the manager
    pub fn run(&mut self) -> Result<DispatchStats, ResmgrError> {
        while self.state != DispatchState::Terminated {
            self.dispatch_once()?;
        }
        log::info!("{}: dispatch ended", self.path);
        Ok(self.stats)
    }

    /// Detaches the path and destroys the channel
    ///
    /// Sessions still open are dropped with the manager.
    pub fn shutdown(mut self) -> Result<(), ResmgrError> {
        self.state = DispatchState::Terminated;
        if let Some(id) = self.path_id.take() {
            self.messenger.kernel().path_detach(id)?;
        }
        self.messenger.connector_mut().destroy_channel()?;
        if !self.sessions.is_empty() {
            log::debug!("{}: dropping {} open sessions", self.path, self.sessions.len());
        }
        Ok(())
    }

    fn context(&self, rcvid: ReceiveId, info: MsgInfo, size: usize) -> Context {
        let connector = self.messenger.connector();
        Context {
            rcvid,
            info,
            chid: connector.chid().unwrap_or(info.chid),
            dpp: self.path_id,
            offset: 0,
            size,
        }
    }

    fn dispatch_pulse(&mut self, pulse: Pulse, info: MsgInfo) -> Result<Dispatched, ResmgrError> {
        self.stats.pulses += 1;
        let event = BridgeEvent::classify(&pulse);
        match event {
            BridgeEvent::Disconnect { scoid } => {
                let closed = self.sessions.close_all_for(&mut self.attr, scoid);
                log::debug!("{}: {} gone, closed {} sessions", self.path, scoid, closed.len());
            }
            BridgeEvent::Unblock { rcvid, .. } => {
                if let Err(err) = self.messenger.error(rcvid, errno::EINTR) {
                    log::debug!("{}: unblock of {} ignored: {}", self.path, rcvid, err);
                }
            }
            _ => {}
        }

        let ctx = self.context(ReceiveId::PULSE, info, 0);
        if let Some(handler) = self.pulse_table.get_mut(&pulse.code) {
            let mut hc = HandlerContext {
                ctx,
                attr: &mut self.attr,
                sessions: &mut self.sessions,
                session: None,
                messenger: &self.messenger,
                session_init: &self.session_init,
            };
            match handler(&mut hc, &pulse) {
                Ok(Control::Continue) => {}
                Ok(Control::Stop) => self.state = DispatchState::Terminated,
                Err(err) => {
                    self.stats.errors += 1;
                    log::warn!("{}: pulse {} handler failed: {}", self.path, pulse.code, err);
                }
            }
        } else if !event.is_system() {
            log::debug!("{}: no handler for pulse {}", self.path, pulse.code);
        }
        Ok(Dispatched::Pulse(event))
    }

    fn dispatch_message(
        &mut self,
        rcvid: ReceiveId,
        len: usize,
        bytes: Vec<u8>,
        info: MsgInfo,
    ) -> Result<Dispatched, ResmgrError> {
        let msg_type = match peek_type(&bytes) {
            Ok(msg_type) => msg_type,
            Err(err) => {
                log::warn!("{}: {}: {}", self.path, rcvid, err);
                self.fail(rcvid, errno::EBADMSG);
                return Ok(Dispatched::Unsupported { msg_type: 0 });
            }
        };

        if msg_type == msg_type::IO_CONNECT {
            return self.dispatch_connect(rcvid, len, &bytes, info);
        }
        match IoOp::from_msg_type(msg_type) {
            Some(op) => self.dispatch_io(rcvid, len, op, bytes, info),
            None => Ok(self.unsupported(rcvid, msg_type)),
        }
    }

    fn dispatch_connect(
        &mut self,
        rcvid: ReceiveId,
        len: usize,
        bytes: &[u8],
        info: MsgInfo,
    ) -> Result<Dispatched, ResmgrError> {
        let message = match ConnectMessage::decode(bytes) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("{}: bad connect message from {}: {}", self.path, rcvid, err);
                self.fail(rcvid, errno::EBADMSG);
                return Ok(Dispatched::Unsupported {
                    msg_type: msg_type::IO_CONNECT,
                });
            }
        };
        let Some(op) = ConnectOp::from_subtype(message.header.subtype) else {
            return Ok(self.unsupported(rcvid, msg_type::IO_CONNECT));
        };
        self.stats.connects += 1;

        if !self.connect_table.contains_key(&op) {
            log::debug!("{}: no {} handler", self.path, op);
            self.fail(rcvid, errno::ENOSYS);
            return Ok(Dispatched::Connect {
                op,
                disposition: Disposition::Errored(errno::ENOSYS),
            });
        }
        let ctx = self.context(rcvid, info, len);
        let request = ConnectRequest { op, message };
        log::debug!("{}: {} {:?} from {}", self.path, op, request.path(), info.coid);

        let Some(handler) = self.connect_table.get_mut(&op) else {
            return Ok(self.unsupported(rcvid, msg_type::IO_CONNECT));
        };
        let mut hc = HandlerContext {
            ctx,
            attr: &mut self.attr,
            sessions: &mut self.sessions,
            session: None,
            messenger: &self.messenger,
            session_init: &self.session_init,
        };
        let result = handler(&mut hc, &request);
        let disposition = self.finish(rcvid, op.name(), result);
        Ok(Dispatched::Connect { op, disposition })
    }

    fn dispatch_io(
        &mut self,
        rcvid: ReceiveId,
        len: usize,
        op: IoOp,
        bytes: Vec<u8>,
        info: MsgInfo,
    ) -> Result<Dispatched, ResmgrError> {
        self.stats.ios += 1;
        let session = self.sessions.lookup(info.scoid, info.coid);
        if !self.io_table.contains_key(&op) {
            log::debug!("{}: no {} handler", self.path, op);
            self.fail(rcvid, errno::ENOSYS);
            return Ok(Dispatched::Io {
                op,
                disposition: Disposition::Errored(errno::ENOSYS),
            });
        }
        if session.is_none() {
            log::debug!("{}: {} from {} without a session", self.path, op, info.coid);
            self.fail(rcvid, errno::EBADF);
            return Ok(Dispatched::Io {
                op,
                disposition: Disposition::Errored(errno::EBADF),
            });
        }

        let request = IoRequest::new(op, bytes);
        let ctx = Context {
            offset: request.data_offset(),
            ..self.context(rcvid, info, len)
        };
        let Some(handler) = self.io_table.get_mut(&op) else {
            return Ok(self.unsupported(rcvid, op.msg_type()));
        };
        let mut hc = HandlerContext {
            ctx,
            attr: &mut self.attr,
            sessions: &mut self.sessions,
            session,
            messenger: &self.messenger,
            session_init: &self.session_init,
        };
        let result = handler(&mut hc, &request);
        let disposition = self.finish(rcvid, op.name(), result);
        Ok(Dispatched::Io { op, disposition })
    }

    /// Sends the reply a handler asked for
    fn finish(&mut self, rcvid: ReceiveId, op: &str, result: Result<Outcome, ResmgrError>) -> Disposition {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                self.stats.errors += 1;
                log::warn!("{}: {} handler failed: {}", self.path, op, err);
                Outcome::Error(err.errno())
            }
        };
        let (sent, disposition) = match outcome {
            Outcome::Reply { status, payload } => (
                self.messenger.reply(rcvid, status, Some(&payload), None),
                Disposition::Replied(status),
            ),
            Outcome::Error(errno) => (self.messenger.error(rcvid, errno), Disposition::Errored(errno)),
            Outcome::NoReply => (Ok(()), Disposition::NoReply),
            Outcome::Stop => {
                self.state = DispatchState::Terminated;
                (self.messenger.reply(rcvid, -1, None, None), Disposition::Stopped)
            }
        };
        if let Err(err) = sent {
            self.stats.failed_replies += 1;
            log::warn!("{}: reply to {} failed: {}", self.path, rcvid, err);
        }
        disposition
    }

    fn unsupported(&mut self, rcvid: ReceiveId, msg_type: u16) -> Dispatched {
        self.stats.unsupported += 1;
        log::warn!("{}: unsupported message type {:#x}", self.path, msg_type);
        self.fail(rcvid, errno::ENOSYS);
        Dispatched::Unsupported { msg_type }
    }

    fn fail(&mut self, rcvid: ReceiveId, errno: i32) {
        if let Err(err) = self.messenger.error(rcvid, errno) {
            self.stats.failed_replies += 1;
            log::warn!("{}: error reply to {} failed: {}", self.path, rcvid, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResourceClient, IOFLAG_READ, IOFLAG_WRITE};
    use ipc::{whence, SigVal};
    use sim_kernel::SimulatedKernel;
    use std::thread::{self, JoinHandle};

    type Manager = ResourceManager<SimulatedKernel, ()>;

    fn kernel() -> Arc<SimulatedKernel> {
        Arc::new(SimulatedKernel::new())
    }

    /// Dispatches `count` items on a worker thread
    fn serve(mut manager: Manager, count: usize) -> JoinHandle<(Manager, Vec<Dispatched>)> {
        thread::spawn(move || {
            let dispatched = (0..count)
                .map(|_| manager.dispatch_once().unwrap())
                .collect();
            (manager, dispatched)
        })
    }

    #[test]
    fn test_name_registration_reports_diagnostics() {
        let manager = Manager::builder(kernel(), "/dev/diag")
            .register_io("read", |_, _| Ok(Outcome::ok()))
            .register_io("bogus", |_, _| Ok(Outcome::ok()))
            .register_connect("write", |_, _| Ok(Outcome::ok()))
            .build()
            .unwrap();
        assert_eq!(
            manager.diagnostics(),
            &[
                RegistrationError::UnknownName("bogus".to_string()),
                RegistrationError::wrong_connect("write"),
            ]
        );
        assert_eq!(manager.state(), DispatchState::Initialized);
    }

    #[test]
    fn test_build_attaches_path_and_stamps_times() {
        let kernel = kernel();
        kernel.advance_time(kernel_api::Duration::from_secs(42));
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/stamped").build().unwrap();
        assert!(kernel.path_exists("/dev/stamped"));
        assert_eq!(manager.attr().mtime, 42);
        assert_eq!(manager.attr().ctime, 42);

        manager.shutdown().unwrap();
        assert!(!kernel.path_exists("/dev/stamped"));
        assert_eq!(kernel.channel_count(), 0);
    }

    #[test]
    fn test_msg_max_size_sizes_receive_buffer() {
        let attr = ResmgrAttr::from_json(r#"{"msg_max_size": 256}"#).unwrap();
        let manager = Manager::builder(kernel(), "/dev/sized")
            .with_resmgr_attr(attr)
            .build()
            .unwrap();
        assert_eq!(manager.resmgr_attr().msg_max_size, 256);
        assert_eq!(manager.messenger().receive_buffer().capacity(), 256);
    }

    #[test]
    fn test_duplicate_path_fails_without_leaking_channel() {
        let kernel = kernel();
        let _first = Manager::builder(Arc::clone(&kernel), "/dev/dup").build().unwrap();
        assert!(Manager::builder(Arc::clone(&kernel), "/dev/dup").build().is_err());
        assert_eq!(kernel.channel_count(), 1);
    }

    #[test]
    fn test_open_stat_close_session() {
        let kernel = kernel();
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/sample")
            .with_attr(Attr::default().with_size(1024))
            .build()
            .unwrap();
        let worker = serve(manager, 4);

        let mut client = ResourceClient::open(Arc::clone(&kernel), "/dev/sample", IOFLAG_READ).unwrap();
        assert_eq!(client.stat().unwrap().size, 1024);
        client.close().unwrap();

        let (manager, dispatched) = worker.join().unwrap();
        assert!(matches!(
            dispatched[0],
            Dispatched::Connect {
                op: ConnectOp::Open,
                disposition: Disposition::Replied(0)
            }
        ));
        assert!(matches!(dispatched[1], Dispatched::Io { op: IoOp::Stat, .. }));
        assert!(matches!(dispatched[2], Dispatched::Io { op: IoOp::CloseDup, .. }));
        assert!(matches!(dispatched[3], Dispatched::Pulse(BridgeEvent::Disconnect { .. })));
        assert!(manager.sessions().is_empty());
        assert_eq!(manager.attr().count, 0);
    }

    #[test]
    fn test_open_below_mount_point_is_not_found() {
        let kernel = kernel();
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/flat").build().unwrap();
        let worker = serve(manager, 2);

        let result = ResourceClient::open(Arc::clone(&kernel), "/dev/flat/sub", IOFLAG_READ);
        assert!(matches!(result, Err(ResmgrError::Server(code)) if code == errno::ENOENT));

        let (manager, _) = worker.join().unwrap();
        assert!(manager.sessions().is_empty());
        assert_eq!(manager.stats().errors, 1);
    }

    #[test]
    fn test_second_open_on_connection_is_busy() {
        let kernel = kernel();
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/once").build().unwrap();
        let worker = serve(manager, 2);

        let client = ResourceClient::open(Arc::clone(&kernel), "/dev/once", IOFLAG_READ).unwrap();
        let mut header = ipc::ConnectHeader::new(ipc::connect_subtype::OPEN);
        header.ioflag = IOFLAG_WRITE;
        let again = ConnectMessage::new(header, "", Vec::new()).unwrap();
        let mut messenger = Messenger::new(Arc::clone(&kernel), TransportConfig::raw());
        let err = messenger
            .send_to(client.coid(), &Payload::bytes(again.encode()), 0, None)
            .unwrap_err();
        assert_eq!(err.errno(), errno::EBUSY);

        let (manager, dispatched) = worker.join().unwrap();
        assert_eq!(
            dispatched[1],
            Dispatched::Connect {
                op: ConnectOp::Open,
                disposition: Disposition::Errored(errno::EBUSY)
            }
        );
        assert_eq!(manager.sessions().len(), 1);
        assert_eq!((manager.attr().count, manager.attr().rcount, manager.attr().wcount), (1, 1, 0));
    }

    #[test]
    fn test_oversized_open_path_releases_connection() {
        let kernel = kernel();
        let _manager = Manager::builder(Arc::clone(&kernel), "/dev/deep").build().unwrap();
        let path = format!("/dev/deep/{}", "d".repeat(u16::MAX as usize));

        assert!(matches!(
            ResourceClient::open(Arc::clone(&kernel), &path, IOFLAG_READ),
            Err(ResmgrError::Wire(ipc::WireError::TooLong { field: "path", .. }))
        ));
        assert_eq!(kernel.connection_count(), 0);
    }

    #[test]
    fn test_write_to_read_only_resource_is_denied() {
        let kernel = kernel();
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/ro")
            .with_attr(Attr::new(ipc::stat::mode::S_IFCHR | 0o444))
            .build()
            .unwrap();
        let worker = serve(manager, 2);

        let result = ResourceClient::open(Arc::clone(&kernel), "/dev/ro", IOFLAG_WRITE);
        assert!(matches!(result, Err(ResmgrError::Server(code)) if code == errno::EACCES));
        worker.join().unwrap();
    }

    #[test]
    fn test_missing_io_handler_replies_enosys() {
        let kernel = kernel();
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/bare").build().unwrap();
        let worker = serve(manager, 2);

        let mut client = ResourceClient::open(Arc::clone(&kernel), "/dev/bare", IOFLAG_WRITE).unwrap();
        assert!(matches!(
            client.write(b"data"),
            Err(ResmgrError::Server(code)) if code == errno::ENOSYS
        ));

        let (_, dispatched) = worker.join().unwrap();
        assert_eq!(
            dispatched[1],
            Dispatched::Io {
                op: IoOp::Write,
                disposition: Disposition::Errored(errno::ENOSYS)
            }
        );
    }

    #[test]
    fn test_io_without_session_is_bad_file() {
        let kernel = kernel();
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/nosession").build().unwrap();
        let worker = serve(manager, 1);

        let (coid, _) = kernel.path_open("/dev/nosession").unwrap();
        let mut messenger = Messenger::new(Arc::clone(&kernel), TransportConfig::raw());
        let stat = Payload::record(&ipc::StatHeader::default());
        let err = messenger.send_to(coid, &stat, 0, None).unwrap_err();
        assert_eq!(err.errno(), errno::EBADF);
        worker.join().unwrap();
    }

    #[test]
    fn test_read_and_lseek_move_offset() {
        let kernel = kernel();
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/text")
            .with_attr(Attr::default().with_size(11))
            .on_io(IoOp::Read, |hc, req| defaults::read_bytes(hc, req, b"hello world"))
            .build()
            .unwrap();
        let worker = serve(manager, 6);

        let mut client = ResourceClient::open(Arc::clone(&kernel), "/dev/text", IOFLAG_READ).unwrap();
        assert_eq!(client.read(5).unwrap(), b"hello");
        assert_eq!(client.lseek(1, whence::SEEK_CUR).unwrap(), 6);
        assert_eq!(client.read(100).unwrap(), b"world");
        assert_eq!(client.lseek(-3, whence::SEEK_END).unwrap(), 8);
        assert!(matches!(
            client.lseek(-1, whence::SEEK_SET),
            Err(ResmgrError::Server(code)) if code == errno::EINVAL
        ));
        worker.join().unwrap();
    }

    #[test]
    fn test_handler_error_becomes_error_reply() {
        let kernel = kernel();
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/faulty")
            .on_io(IoOp::Devctl, |_, _| Err(ResmgrError::Busy))
            .build()
            .unwrap();
        let worker = serve(manager, 2);

        let mut client = ResourceClient::open(Arc::clone(&kernel), "/dev/faulty", IOFLAG_READ).unwrap();
        assert!(matches!(
            client.devctl(1, &[], 0),
            Err(ResmgrError::Server(code)) if code == errno::EBUSY
        ));
        let (manager, _) = worker.join().unwrap();
        assert_eq!(manager.stats().errors, 1);
    }

    #[test]
    fn test_disconnect_releases_abandoned_sessions() {
        let kernel = kernel();
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/abandon").build().unwrap();
        let worker = serve(manager, 2);

        let client = ResourceClient::open(Arc::clone(&kernel), "/dev/abandon", IOFLAG_READ).unwrap();
        kernel.connect_detach(client.coid()).unwrap();

        let (manager, dispatched) = worker.join().unwrap();
        assert!(matches!(dispatched[1], Dispatched::Pulse(BridgeEvent::Disconnect { .. })));
        assert!(manager.sessions().is_empty());
        assert!(!manager.attr().is_referenced());
    }

    #[test]
    fn test_pulse_handler_stops_run() {
        let kernel = kernel();
        let mut manager = Manager::builder(Arc::clone(&kernel), "/dev/pulsed")
            .on_pulse(5, |_, pulse| {
                Ok(if pulse.value == SigVal::Int(1) {
                    Control::Stop
                } else {
                    Control::Continue
                })
            })
            .build()
            .unwrap();
        let (coid, _) = kernel.path_open("/dev/pulsed").unwrap();
        kernel.msg_send_pulse(coid, 10, 5, SigVal::Int(0)).unwrap();
        kernel.msg_send_pulse(coid, 10, 5, SigVal::Int(1)).unwrap();

        let stats = manager.run().unwrap();
        assert_eq!(stats.pulses, 2);
        assert_eq!(stats.connects + stats.ios, 0);
        assert_eq!(manager.state(), DispatchState::Terminated);
        assert!(matches!(manager.dispatch_once(), Err(ResmgrError::Terminated)));
    }

    #[test]
    fn test_add_pulse_only_before_dispatching() {
        let kernel = kernel();
        let mut manager = Manager::builder(Arc::clone(&kernel), "/dev/late").build().unwrap();
        manager.add_pulse(3, |_, _| Ok(Control::Continue)).unwrap();

        let (coid, _) = kernel.path_open("/dev/late").unwrap();
        kernel.msg_send_pulse(coid, 10, 3, SigVal::Int(0)).unwrap();
        manager.dispatch_once().unwrap();
        assert_eq!(
            manager.add_pulse(4, |_, _| Ok(Control::Continue)),
            Err(RegistrationError::AlreadyDispatching)
        );
    }

    #[test]
    fn test_stop_outcome_replies_minus_one() {
        let kernel = kernel();
        let manager = Manager::builder(Arc::clone(&kernel), "/dev/stop")
            .on_io(IoOp::Devctl, |_, _| Ok(Outcome::Stop))
            .build()
            .unwrap();
        let worker = thread::spawn(move || {
            let mut manager = manager;
            manager.run().map(|stats| (stats, manager.state()))
        });

        let mut client = ResourceClient::open(Arc::clone(&kernel), "/dev/stop", IOFLAG_READ).unwrap();
        assert!(matches!(client.devctl(7, &[], 0), Err(ResmgrError::Server(-1))));
        let (stats, state) = worker.join().unwrap().unwrap();
        assert_eq!(state, DispatchState::Terminated);
        assert_eq!(stats.ios, 1);
    }

    #[test]
    fn test_session_init_hook_and_lock_pair() {
        let kernel = kernel();
        let manager: ResourceManager<SimulatedKernel, u32> =
            ResourceManager::builder(Arc::clone(&kernel), "/dev/locked")
                .with_session_init(|key| key.as_raw() * 10)
                .on_io(IoOp::Devctl, |hc, _| {
                    let tag = hc.ocb()?.user;
                    Ok(Outcome::status(tag as i32))
                })
                .build()
                .unwrap();
        let worker = thread::spawn(move || {
            let mut manager = manager;
            for _ in 0..4 {
                manager.dispatch_once().unwrap();
            }
            manager
        });

        let mut client = ResourceClient::open(Arc::clone(&kernel), "/dev/locked", IOFLAG_READ).unwrap();
        assert_eq!(client.devctl(0, &[], 0).unwrap().0, 10);
        client.lock().unwrap();
        client.unlock().unwrap();
        let manager = worker.join().unwrap();
        assert_eq!(manager.attr().lock_tid, None);
        assert_eq!(manager.sessions().len(), 1);
    }
}
