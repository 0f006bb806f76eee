//! # Simulated Kernel
//!
//! This crate provides an in-process implementation of the kernel API.
//!
//! ## Purpose
//!
//! The simulated kernel allows testing servers and clients without a real
//! microkernel:
//! - Runs under `cargo test`
//! - Real blocking: `msg_send` and `msg_receive` block the calling thread
//!   exactly as the kernel primitives do
//! - Controlled time: timers fire only when simulated time moves
//! - Inspectable: queue depths, pending transactions and timer state are
//!   all observable
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! This is not a "toy" or "mock" - it's a full implementation of the
//! kernel API that happens to run in-process for testing. One simulated
//! kernel is one node; every thread that holds an `Arc` of it is a thread
//! of the same process.

pub mod config;
pub mod fault_injection;
pub mod interrupt;
pub mod message_queue;
pub mod test_utils;
pub mod timer;

pub use config::SimConfig;

use core_types::{
    errno, ChannelId, ConnectionId, InterruptId, NameScope, NodeDescriptor, ProcessId, ReceiveId,
    ServerConnectionId, ThreadId, TimerId,
};
use fault_injection::{FaultInjector, FaultPlan};
use interrupt::InterruptController;
use ipc::{pulse_code, MsgInfo, Pulse, SigEvent, SigVal, WireRecord};
use kernel_api::{
    ChannelFlags, Duration, Instant, InterruptApi, KernelApi, KernelError, NameAttachment, PathId,
    SendOutcome, TimerApi, TimerSpec, SIDE_CHANNEL,
};
use message_queue::{MessageQueue, QueueEntry};
use name_registry::{PathNamespace, RegistryError};
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use timer::{SimTimer, TimerTable};

/// Priority reported for senders; the simulation does not schedule
const DEFAULT_PRIORITY: i16 = 10;

static NEXT_TID: AtomicI32 = AtomicI32::new(1);

thread_local! {
    static THREAD_ID: Cell<i32> = const { Cell::new(0) };
}

/// Thread id of the caller, assigned on first use
fn current_tid() -> ThreadId {
    THREAD_ID.with(|tid| {
        if tid.get() == 0 {
            tid.set(NEXT_TID.fetch_add(1, Ordering::Relaxed));
        }
        ThreadId::from_raw(tid.get())
    })
}

struct Channel {
    flags: ChannelFlags,
    queue: MessageQueue,
}

struct Connection {
    chid: ChannelId,
    scoid: ServerConnectionId,
}

enum TransactionState {
    /// Waiting in the channel queue
    Queued,
    /// Handed to a receiver, waiting for a reply
    Received,
    /// Reply stored, sender not yet woken
    Replied { status: i32, data: Vec<u8> },
    /// Sender will wake with this error
    Failed(KernelError),
}

struct Transaction {
    coid: ConnectionId,
    chid: ChannelId,
    scoid: ServerConnectionId,
    sender: ThreadId,
    msg: Vec<u8>,
    reply_capacity: usize,
    state: TransactionState,
    unblock_pulsed: bool,
    info: MsgInfo,
}

/// Simulated kernel state, guarded by one lock
struct KernelState {
    current_time: Instant,
    channels: HashMap<ChannelId, Channel>,
    connections: HashMap<ConnectionId, Connection>,
    transactions: HashMap<ReceiveId, Transaction>,
    /// Latest receive id of each client connection, valid for event delivery
    issued: HashMap<ServerConnectionId, ReceiveId>,
    namespace: PathNamespace,
    timers: TimerTable,
    interrupts: InterruptController,
    fault_injector: Option<FaultInjector>,
    next_chid: i32,
    next_coid: i32,
    next_side_coid: i32,
    next_scoid: i32,
    next_rcvid: i32,
}

impl KernelState {
    fn new() -> Self {
        Self {
            current_time: Instant::EPOCH,
            channels: HashMap::new(),
            connections: HashMap::new(),
            transactions: HashMap::new(),
            issued: HashMap::new(),
            namespace: PathNamespace::new(),
            timers: TimerTable::new(),
            interrupts: InterruptController::new(),
            fault_injector: None,
            next_chid: 1,
            next_coid: 3,
            next_side_coid: SIDE_CHANNEL,
            next_scoid: 1,
            next_rcvid: 1,
        }
    }

    fn create_channel(
        &mut self,
        flags: ChannelFlags,
        capacity: usize,
    ) -> Result<ChannelId, KernelError> {
        if let Some(injector) = self.fault_injector.as_ref() {
            if injector.should_fail_channel_create() {
                return Err(KernelError::ResourceExhausted("channels".to_string()));
            }
        }
        let chid = ChannelId::from_raw(self.next_chid);
        self.next_chid += 1;
        self.channels.insert(
            chid,
            Channel {
                flags,
                queue: MessageQueue::with_capacity(capacity),
            },
        );
        log::trace!("sim: created {} flags={:?}", chid, flags);
        Ok(chid)
    }

    fn destroy_channel(&mut self, chid: ChannelId) -> Result<(), KernelError> {
        self.channels
            .remove(&chid)
            .ok_or(KernelError::ChannelNotFound(chid))?;
        for tx in self.transactions.values_mut().filter(|tx| tx.chid == chid) {
            if matches!(tx.state, TransactionState::Queued | TransactionState::Received) {
                tx.state = TransactionState::Failed(KernelError::ChannelNotFound(chid));
            }
        }
        self.namespace.unregister_channel(chid);
        log::trace!("sim: destroyed {}", chid);
        Ok(())
    }

    fn attach_connection(&mut self, chid: ChannelId, index: i32) -> Result<ConnectionId, KernelError> {
        if let Some(injector) = self.fault_injector.as_ref() {
            if injector.should_fail_connect() {
                return Err(KernelError::ResourceExhausted("connections".to_string()));
            }
        }
        if !self.channels.contains_key(&chid) {
            return Err(KernelError::ChannelNotFound(chid));
        }
        let coid = if index & SIDE_CHANNEL != 0 {
            self.next_side_coid += 1;
            ConnectionId::from_raw(self.next_side_coid - 1)
        } else {
            self.next_coid += 1;
            ConnectionId::from_raw(self.next_coid - 1)
        };
        let scoid = ServerConnectionId::from_raw(self.next_scoid);
        self.next_scoid += 1;
        self.connections.insert(coid, Connection { chid, scoid });
        log::trace!("sim: {} -> {} ({})", coid, chid, scoid);
        Ok(coid)
    }

    fn detach_connection(&mut self, coid: ConnectionId) -> Result<(), KernelError> {
        let connection = self
            .connections
            .remove(&coid)
            .ok_or(KernelError::ConnectionNotFound(coid))?;
        self.issued.remove(&connection.scoid);

        let notify = self
            .channels
            .get(&connection.chid)
            .map(|channel| channel.flags.contains(ChannelFlags::DISCONNECT))
            .unwrap_or(false);
        if notify {
            let pulse = Pulse::new(pulse_code::DISCONNECT, SigVal::Int(0), connection.scoid);
            self.queue_pulse(connection.chid, pulse)?;
        }
        log::trace!("sim: detached {}", coid);
        Ok(())
    }

    fn queue_pulse(&mut self, chid: ChannelId, pulse: Pulse) -> Result<(), KernelError> {
        if let Some(injector) = self.fault_injector.as_mut() {
            if injector.should_drop_pulse(&pulse) {
                log::trace!("sim: dropped {} on {}", pulse, chid);
                return Ok(());
            }
        }
        let channel = self
            .channels
            .get_mut(&chid)
            .ok_or(KernelError::ChannelNotFound(chid))?;
        channel
            .queue
            .push(QueueEntry::Pulse(pulse))
            .map_err(|_| KernelError::ResourceExhausted(format!("queue of {}", chid)))
    }

    fn send_pulse(&mut self, coid: ConnectionId, code: i8, value: SigVal) -> Result<(), KernelError> {
        let connection = self
            .connections
            .get(&coid)
            .ok_or(KernelError::ConnectionNotFound(coid))?;
        let (chid, scoid) = (connection.chid, connection.scoid);
        self.queue_pulse(chid, Pulse::new(code, value, scoid))
    }

    fn deliver_event(&mut self, event: SigEvent, target: Option<ReceiveId>) -> Result<(), KernelError> {
        match event {
            SigEvent::Pulse {
                coid, code, value, ..
            } => self.send_pulse(coid, code, value),
            SigEvent::Unblock => {
                if let Some(rcvid) = target {
                    self.fail_transaction(rcvid, KernelError::Interrupted);
                }
                Ok(())
            }
            SigEvent::Interrupt => Ok(()),
        }
    }

    /// Wakes the sender of `rcvid` with `error` if it is still blocked
    fn fail_transaction(&mut self, rcvid: ReceiveId, error: KernelError) -> bool {
        let Some(tx) = self.transactions.get_mut(&rcvid) else {
            return false;
        };
        let was_queued = matches!(tx.state, TransactionState::Queued);
        if !matches!(
            tx.state,
            TransactionState::Queued | TransactionState::Received
        ) {
            return false;
        }
        tx.state = TransactionState::Failed(error);
        let chid = tx.chid;
        if was_queued {
            if let Some(channel) = self.channels.get_mut(&chid) {
                channel.queue.remove_message(rcvid);
            }
        }
        true
    }

    /// Interrupts the blocked send on `coid`
    ///
    /// A sender still in the queue fails at once. A sender whose message was
    /// received is held until the server replies when the channel asked for
    /// unblock pulses; otherwise it fails at once as well.
    fn interrupt_send(&mut self, coid: ConnectionId) -> bool {
        let pending = self
            .transactions
            .iter()
            .find(|(_, tx)| {
                tx.coid == coid
                    && matches!(
                        tx.state,
                        TransactionState::Queued | TransactionState::Received
                    )
            })
            .map(|(rcvid, tx)| {
                (
                    *rcvid,
                    tx.chid,
                    tx.scoid,
                    matches!(tx.state, TransactionState::Received),
                    tx.unblock_pulsed,
                )
            });
        let Some((rcvid, chid, scoid, received, already_pulsed)) = pending else {
            return false;
        };

        let wants_pulse = self
            .channels
            .get(&chid)
            .map(|channel| channel.flags.contains(ChannelFlags::UNBLOCK))
            .unwrap_or(false);

        if received && wants_pulse {
            if !already_pulsed {
                let pulse = Pulse::new(pulse_code::UNBLOCK, SigVal::Int(rcvid.as_raw()), scoid);
                if self.queue_pulse(chid, pulse).is_ok() {
                    if let Some(tx) = self.transactions.get_mut(&rcvid) {
                        tx.unblock_pulsed = true;
                    }
                }
            }
            return true;
        }
        self.fail_transaction(rcvid, KernelError::Interrupted)
    }

    fn fire_timers(&mut self) {
        let now = self.current_time;
        for event in self.timers.collect_due(now) {
            if let Err(err) = self.deliver_event(event, None) {
                log::warn!("sim: timer event {} not delivered: {}", event, err);
            }
        }
    }

    fn received(&self, rcvid: ReceiveId) -> Result<&Transaction, KernelError> {
        match self.transactions.get(&rcvid) {
            Some(tx) if matches!(tx.state, TransactionState::Received) => Ok(tx),
            _ => Err(KernelError::StaleReceiveId(rcvid)),
        }
    }

    fn complete(&mut self, rcvid: ReceiveId, state: TransactionState) -> Result<(), KernelError> {
        match self.transactions.get_mut(&rcvid) {
            Some(tx) if matches!(tx.state, TransactionState::Received) => {
                tx.state = state;
                Ok(())
            }
            _ => Err(KernelError::StaleReceiveId(rcvid)),
        }
    }
}

fn registry_error(err: RegistryError) -> KernelError {
    match err {
        RegistryError::PathInUse(path) => KernelError::NameInUse(path),
        RegistryError::PathNotFound(path) => KernelError::NameNotFound(path),
        RegistryError::NotFound(id) => KernelError::NameNotFound(id.to_string()),
        RegistryError::InvalidPath(path) => KernelError::InvalidArgument(path),
    }
}

/// Simulated kernel
///
/// Shared between threads as `Arc<SimulatedKernel>`. All state sits behind
/// one mutex; every state change wakes every blocked caller, and each
/// re-checks the condition it is waiting for.
pub struct SimulatedKernel {
    config: SimConfig,
    state: Mutex<KernelState>,
    wakeup: Condvar,
}

impl SimulatedKernel {
    /// Creates a new simulated kernel with default configuration
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Creates a simulated kernel with the given configuration
    pub fn with_config(config: SimConfig) -> Self {
        Self {
            config,
            state: Mutex::new(KernelState::new()),
            wakeup: Condvar::new(),
        }
    }

    /// Sets the fault injector for this kernel
    pub fn with_fault_injector(self, injector: FaultInjector) -> Self {
        self.state.lock().fault_injector = Some(injector);
        self
    }

    /// Sets the fault plan for this kernel
    ///
    /// Convenience method that creates a fault injector from a plan.
    pub fn with_fault_plan(self, plan: FaultPlan) -> Self {
        self.with_fault_injector(FaultInjector::new(plan))
    }

    /// Returns the configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Advances simulated time and fires every timer that came due
    pub fn advance_time(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.current_time = state.current_time + duration;
        state.fire_timers();
        self.wakeup.notify_all();
    }

    /// Raises interrupt line `irq`
    ///
    /// Returns the number of pulse events delivered.
    pub fn raise_interrupt(&self, irq: u32) -> usize {
        let mut state = self.state.lock();
        let events = state.interrupts.raise(irq);
        let mut delivered = 0;
        for event in events {
            match state.deliver_event(event, None) {
                Ok(()) => delivered += 1,
                Err(err) => log::warn!("sim: irq {} event not delivered: {}", irq, err),
            }
        }
        self.wakeup.notify_all();
        delivered
    }

    /// Interrupts the send blocked on `coid`, as a signal would
    ///
    /// Returns false when no send is blocked on that connection.
    pub fn interrupt_send(&self, coid: ConnectionId) -> bool {
        let mut state = self.state.lock();
        let found = state.interrupt_send(coid);
        self.wakeup.notify_all();
        found
    }

    /// Checks if the kernel is idle (nothing queued, nobody waiting for a reply)
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.channels.values().all(|ch| ch.queue.is_empty()) && state.transactions.is_empty()
    }

    /// Returns the number of channels
    pub fn channel_count(&self) -> usize {
        self.state.lock().channels.len()
    }

    /// Returns the number of live connections
    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Returns the number of registered paths and names
    pub fn path_count(&self) -> usize {
        self.state.lock().namespace.count()
    }

    /// Returns the number of sends waiting to be received or replied to
    pub fn pending_transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    /// Returns the number of receive ids still valid for event delivery
    pub fn issued_receive_count(&self) -> usize {
        self.state.lock().issued.len()
    }

    /// Returns the number of entries queued on `chid`
    pub fn queued_on(&self, chid: ChannelId) -> usize {
        self.state
            .lock()
            .channels
            .get(&chid)
            .map(|channel| channel.queue.len())
            .unwrap_or(0)
    }

    /// Returns a snapshot of a timer
    pub fn timer(&self, id: TimerId) -> Option<SimTimer> {
        self.state.lock().timers.get(id).cloned()
    }

    /// Returns the current mask depth of an interrupt attachment
    pub fn interrupt_mask_count(&self, id: InterruptId) -> Option<u32> {
        self.state
            .lock()
            .interrupts
            .get(id)
            .map(|attachment| attachment.mask_count())
    }

    /// True when an unmasked attachment is waiting on line `irq`
    pub fn interrupt_ready(&self, irq: u32) -> bool {
        self.state.lock().interrupts.is_ready(irq)
    }

    /// Returns the number of sends interrupted by the fault injector
    pub fn sends_interrupted(&self) -> usize {
        self.state
            .lock()
            .fault_injector
            .as_ref()
            .map(|injector| injector.sends_interrupted())
            .unwrap_or(0)
    }
}

impl Default for SimulatedKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelApi for SimulatedKernel {
    fn pid(&self) -> ProcessId {
        ProcessId::from_raw(self.config.pid)
    }

    fn channel_create(&self, flags: ChannelFlags) -> Result<ChannelId, KernelError> {
        self.state
            .lock()
            .create_channel(flags, self.config.channel_capacity)
    }

    fn channel_destroy(&self, chid: ChannelId) -> Result<(), KernelError> {
        let result = self.state.lock().destroy_channel(chid);
        self.wakeup.notify_all();
        result
    }

    fn connect_attach(
        &self,
        _nd: NodeDescriptor,
        pid: ProcessId,
        chid: ChannelId,
        index: i32,
        _flags: i32,
    ) -> Result<ConnectionId, KernelError> {
        if pid.as_raw() != 0 && pid != self.pid() {
            return Err(KernelError::ChannelNotFound(chid));
        }
        self.state.lock().attach_connection(chid, index)
    }

    fn connect_detach(&self, coid: ConnectionId) -> Result<(), KernelError> {
        let result = self.state.lock().detach_connection(coid);
        self.wakeup.notify_all();
        result
    }

    fn name_attach(&self, name: &str, scope: NameScope) -> Result<NameAttachment, KernelError> {
        let mut state = self.state.lock();
        let flags = ChannelFlags::DISCONNECT | ChannelFlags::UNBLOCK | ChannelFlags::COID_DISCONNECT;
        let chid = state.create_channel(flags, self.config.channel_capacity)?;
        match state
            .namespace
            .register_name(name, scope, self.pid(), chid)
        {
            Ok(dpp) => Ok(NameAttachment {
                chid,
                dpp,
                name: name.to_string(),
                scope,
            }),
            Err(err) => {
                state.destroy_channel(chid)?;
                Err(registry_error(err))
            }
        }
    }

    fn name_detach(&self, attachment: &NameAttachment) -> Result<(), KernelError> {
        let mut state = self.state.lock();
        state
            .namespace
            .unregister(attachment.dpp)
            .map_err(registry_error)?;
        let result = state.destroy_channel(attachment.chid);
        self.wakeup.notify_all();
        result
    }

    fn name_open(&self, name: &str, scope: NameScope) -> Result<ConnectionId, KernelError> {
        let mut state = self.state.lock();
        let chid = state
            .namespace
            .lookup_name(name, scope)
            .map_err(registry_error)?
            .chid;
        state.attach_connection(chid, SIDE_CHANNEL)
    }

    fn name_close(&self, coid: ConnectionId) -> Result<(), KernelError> {
        self.connect_detach(coid)
    }

    fn path_attach(&self, path: &str, chid: ChannelId) -> Result<PathId, KernelError> {
        let mut state = self.state.lock();
        if !state.channels.contains_key(&chid) {
            return Err(KernelError::ChannelNotFound(chid));
        }
        state
            .namespace
            .register(path, self.pid(), chid)
            .map_err(registry_error)
    }

    fn path_detach(&self, id: PathId) -> Result<(), KernelError> {
        self.state
            .lock()
            .namespace
            .unregister(id)
            .map(|_| ())
            .map_err(registry_error)
    }

    fn path_open(&self, path: &str) -> Result<(ConnectionId, String), KernelError> {
        let mut state = self.state.lock();
        let (chid, remainder) = {
            let (entry, remainder) = state.namespace.resolve(path).map_err(registry_error)?;
            (entry.chid, remainder)
        };
        let coid = state.attach_connection(chid, SIDE_CHANNEL)?;
        Ok((coid, remainder))
    }

    fn path_exists(&self, path: &str) -> bool {
        self.state.lock().namespace.exists(path)
    }

    fn msg_send(
        &self,
        coid: ConnectionId,
        msg: &[u8],
        reply: &mut [u8],
    ) -> Result<SendOutcome, KernelError> {
        let mut state = self.state.lock();
        let (chid, scoid) = state
            .connections
            .get(&coid)
            .map(|connection| (connection.chid, connection.scoid))
            .ok_or(KernelError::ConnectionNotFound(coid))?;
        if !state.channels.contains_key(&chid) {
            return Err(KernelError::ChannelNotFound(chid));
        }
        if let Some(injector) = state.fault_injector.as_mut() {
            if injector.should_interrupt_send(chid) {
                log::trace!("sim: send on {} interrupted by fault plan", coid);
                return Err(KernelError::Interrupted);
            }
        }

        let rcvid = ReceiveId::from_raw(state.next_rcvid);
        state.next_rcvid += 1;
        let pushed = state
            .channels
            .get_mut(&chid)
            .map(|channel| channel.queue.push(QueueEntry::Message(rcvid)).is_ok())
            .unwrap_or(false);
        if !pushed {
            return Err(KernelError::ResourceExhausted(format!("queue of {}", chid)));
        }
        state.transactions.insert(
            rcvid,
            Transaction {
                coid,
                chid,
                scoid,
                sender: current_tid(),
                msg: msg.to_vec(),
                reply_capacity: reply.len(),
                state: TransactionState::Queued,
                unblock_pulsed: false,
                info: MsgInfo::default(),
            },
        );
        state.issued.insert(scoid, rcvid);
        self.wakeup.notify_all();

        loop {
            let finished = match state.transactions.get(&rcvid).map(|tx| &tx.state) {
                Some(TransactionState::Replied { .. }) | Some(TransactionState::Failed(_)) => true,
                Some(_) => false,
                None => return Err(KernelError::StaleReceiveId(rcvid)),
            };
            if finished {
                break;
            }
            self.wakeup.wait(&mut state);
        }

        let tx = state
            .transactions
            .remove(&rcvid)
            .ok_or(KernelError::StaleReceiveId(rcvid))?;
        match tx.state {
            TransactionState::Replied { status, data } => {
                let reply_len = data.len().min(reply.len());
                reply[..reply_len].copy_from_slice(&data[..reply_len]);
                Ok(SendOutcome { status, reply_len })
            }
            TransactionState::Failed(err) => Err(err),
            TransactionState::Queued | TransactionState::Received => {
                Err(KernelError::StaleReceiveId(rcvid))
            }
        }
    }

    fn msg_receive(
        &self,
        chid: ChannelId,
        buf: &mut [u8],
    ) -> Result<(ReceiveId, MsgInfo), KernelError> {
        let pid = self.pid();
        let mut state = self.state.lock();
        loop {
            let entry = state
                .channels
                .get_mut(&chid)
                .ok_or(KernelError::ChannelNotFound(chid))?
                .queue
                .pop();

            match entry {
                Some(QueueEntry::Pulse(pulse)) => {
                    let bytes = pulse.to_bytes();
                    let copied = bytes.len().min(buf.len());
                    buf[..copied].copy_from_slice(&bytes[..copied]);
                    let info = MsgInfo {
                        pid,
                        chid,
                        scoid: pulse.scoid,
                        msglen: copied,
                        srcmsglen: Pulse::SIZE,
                        priority: DEFAULT_PRIORITY,
                        ..MsgInfo::default()
                    };
                    return Ok((ReceiveId::PULSE, info));
                }
                Some(QueueEntry::Message(rcvid)) => {
                    let Some(tx) = state.transactions.get_mut(&rcvid) else {
                        continue;
                    };
                    if !matches!(tx.state, TransactionState::Queued) {
                        continue;
                    }
                    let copied = tx.msg.len().min(buf.len());
                    buf[..copied].copy_from_slice(&tx.msg[..copied]);
                    tx.info = MsgInfo {
                        nd: NodeDescriptor::LOCAL,
                        srcnd: NodeDescriptor::LOCAL,
                        pid,
                        tid: tx.sender,
                        chid,
                        scoid: tx.scoid,
                        coid: tx.coid,
                        msglen: copied,
                        srcmsglen: tx.msg.len(),
                        dstmsglen: tx.reply_capacity,
                        priority: DEFAULT_PRIORITY,
                        flags: 0,
                    };
                    tx.state = TransactionState::Received;
                    return Ok((rcvid, tx.info));
                }
                None => self.wakeup.wait(&mut state),
            }
        }
    }

    fn msg_read(
        &self,
        rcvid: ReceiveId,
        buf: &mut [u8],
        offset: usize,
    ) -> Result<usize, KernelError> {
        let state = self.state.lock();
        let tx = state.received(rcvid)?;
        let start = offset.min(tx.msg.len());
        let copied = (tx.msg.len() - start).min(buf.len());
        buf[..copied].copy_from_slice(&tx.msg[start..start + copied]);
        Ok(copied)
    }

    fn msg_reply(&self, rcvid: ReceiveId, status: i32, data: &[u8]) -> Result<(), KernelError> {
        let result = self.state.lock().complete(
            rcvid,
            TransactionState::Replied {
                status,
                data: data.to_vec(),
            },
        );
        self.wakeup.notify_all();
        result
    }

    fn msg_error(&self, rcvid: ReceiveId, errno: i32) -> Result<(), KernelError> {
        let error = if errno == errno::EINTR {
            KernelError::Interrupted
        } else {
            KernelError::ServerError(errno)
        };
        let result = self
            .state
            .lock()
            .complete(rcvid, TransactionState::Failed(error));
        self.wakeup.notify_all();
        result
    }

    fn msg_info(&self, rcvid: ReceiveId) -> Result<MsgInfo, KernelError> {
        Ok(self.state.lock().received(rcvid)?.info)
    }

    fn msg_send_pulse(
        &self,
        coid: ConnectionId,
        _priority: i16,
        code: i8,
        value: SigVal,
    ) -> Result<(), KernelError> {
        let result = self.state.lock().send_pulse(coid, code, value);
        self.wakeup.notify_all();
        result
    }

    fn msg_deliver_event(&self, rcvid: ReceiveId, event: &SigEvent) -> Result<(), KernelError> {
        let mut state = self.state.lock();
        if !state.issued.values().any(|issued| *issued == rcvid) {
            return Err(KernelError::StaleReceiveId(rcvid));
        }
        let result = state.deliver_event(*event, Some(rcvid));
        self.wakeup.notify_all();
        result
    }

    fn now(&self) -> Instant {
        self.state.lock().current_time
    }

    fn sleep(&self, duration: Duration) {
        self.advance_time(duration);
        std::thread::yield_now();
    }
}

impl TimerApi for SimulatedKernel {
    fn timer_create(&self, event: SigEvent) -> Result<TimerId, KernelError> {
        Ok(self.state.lock().timers.create(event))
    }

    fn timer_settime(
        &self,
        id: TimerId,
        absolute: bool,
        spec: TimerSpec,
    ) -> Result<(), KernelError> {
        let mut state = self.state.lock();
        let now = state.current_time;
        state.timers.settime(id, now, absolute, spec)?;
        state.fire_timers();
        self.wakeup.notify_all();
        Ok(())
    }

    fn timer_delete(&self, id: TimerId) -> Result<(), KernelError> {
        self.state.lock().timers.delete(id)
    }
}

impl InterruptApi for SimulatedKernel {
    fn interrupt_attach_event(
        &self,
        irq: u32,
        event: SigEvent,
        flags: u32,
    ) -> Result<InterruptId, KernelError> {
        Ok(self.state.lock().interrupts.attach(irq, event, flags))
    }

    fn interrupt_wait(&self, id: InterruptId) -> Result<(), KernelError> {
        let mut state = self.state.lock();
        while !state.interrupts.take_pending(id)? {
            self.wakeup.wait(&mut state);
        }
        Ok(())
    }

    fn interrupt_mask(&self, irq: u32, id: InterruptId) -> Result<u32, KernelError> {
        self.state.lock().interrupts.mask(irq, id)
    }

    fn interrupt_unmask(&self, irq: u32, id: InterruptId) -> Result<u32, KernelError> {
        self.state.lock().interrupts.unmask(irq, id)
    }

    fn interrupt_detach(&self, id: InterruptId) -> Result<(), KernelError> {
        let result = self.state.lock().interrupts.detach(id);
        self.wakeup.notify_all();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault_injection::{MessageFault, ResourceFault};
    use std::sync::Arc;
    use std::thread;

    fn local() -> NodeDescriptor {
        NodeDescriptor::LOCAL
    }

    #[test]
    fn test_kernel_creation() {
        let kernel = SimulatedKernel::new();
        assert_eq!(kernel.channel_count(), 0);
        assert_eq!(kernel.now(), Instant::EPOCH);
        assert!(kernel.is_idle());
    }

    #[test]
    fn test_channel_lifecycle() {
        let kernel = SimulatedKernel::new();
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        assert_eq!(kernel.channel_count(), 1);
        kernel.channel_destroy(chid).unwrap();
        assert_eq!(kernel.channel_count(), 0);
        assert_eq!(
            kernel.channel_destroy(chid),
            Err(KernelError::ChannelNotFound(chid))
        );
    }

    #[test]
    fn test_connect_to_missing_channel() {
        let kernel = SimulatedKernel::new();
        let chid = ChannelId::from_raw(99);
        assert_eq!(
            kernel.connect_attach(local(), kernel.pid(), chid, 0, 0),
            Err(KernelError::ChannelNotFound(chid))
        );
    }

    #[test]
    fn test_side_channel_coids() {
        let kernel = SimulatedKernel::new();
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel
            .connect_attach(local(), kernel.pid(), chid, SIDE_CHANNEL, 0)
            .unwrap();
        assert!(coid.as_raw() >= SIDE_CHANNEL);
        let plain = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();
        assert!(plain.as_raw() < SIDE_CHANNEL);
    }

    #[test]
    fn test_send_receive_reply() {
        let kernel = Arc::new(SimulatedKernel::new());
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();

        let client = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || {
                let mut reply = [0u8; 16];
                let outcome = kernel.msg_send(coid, b"ping", &mut reply).unwrap();
                (outcome, reply[..outcome.reply_len].to_vec())
            })
        };

        let mut buf = [0u8; 64];
        let (rcvid, info) = kernel.msg_receive(chid, &mut buf).unwrap();
        assert!(rcvid.is_message());
        assert_eq!(&buf[..info.msglen], b"ping");
        assert_eq!(info.srcmsglen, 4);
        assert_eq!(info.dstmsglen, 16);
        assert_eq!(info.coid, coid);
        kernel.msg_reply(rcvid, 0, b"pong").unwrap();

        let (outcome, data) = client.join().unwrap();
        assert_eq!(outcome, SendOutcome { status: 0, reply_len: 4 });
        assert_eq!(data, b"pong");
        assert!(kernel.is_idle());
    }

    #[test]
    fn test_truncated_receive_and_read() {
        let kernel = Arc::new(SimulatedKernel::new());
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();
        let message: Vec<u8> = (0..100u8).collect();

        let client = {
            let kernel = Arc::clone(&kernel);
            let message = message.clone();
            thread::spawn(move || kernel.msg_send(coid, &message, &mut []).unwrap())
        };

        let mut small = [0u8; 10];
        let (rcvid, info) = kernel.msg_receive(chid, &mut small).unwrap();
        assert_eq!(info.msglen, 10);
        assert_eq!(info.srcmsglen, 100);
        assert!(info.is_truncated());

        let mut full = vec![0u8; 100];
        assert_eq!(kernel.msg_read(rcvid, &mut full, 0).unwrap(), 100);
        assert_eq!(full, message);
        let mut tail = [0u8; 8];
        assert_eq!(kernel.msg_read(rcvid, &mut tail, 96).unwrap(), 4);

        kernel.msg_reply(rcvid, 7, &[]).unwrap();
        assert_eq!(client.join().unwrap().status, 7);
    }

    #[test]
    fn test_error_reply() {
        let kernel = Arc::new(SimulatedKernel::new());
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();

        let client = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || kernel.msg_send(coid, b"x", &mut [0u8; 4]))
        };
        let (rcvid, _) = kernel.msg_receive(chid, &mut [0u8; 8]).unwrap();
        kernel.msg_error(rcvid, errno::ENOSYS).unwrap();

        assert_eq!(client.join().unwrap(), Err(KernelError::ServerError(errno::ENOSYS)));
        assert_eq!(
            kernel.msg_reply(rcvid, 0, &[]),
            Err(KernelError::StaleReceiveId(rcvid))
        );
    }

    #[test]
    fn test_pulse_has_receive_id_zero() {
        let kernel = SimulatedKernel::new();
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();
        kernel.msg_send_pulse(coid, 10, 5, SigVal::Int(42)).unwrap();

        let mut buf = [0u8; 64];
        let (rcvid, info) = kernel.msg_receive(chid, &mut buf).unwrap();
        assert!(rcvid.is_pulse());
        let pulse = Pulse::read_from(&buf[..info.msglen]).unwrap();
        assert_eq!(pulse.code, 5);
        assert_eq!(pulse.value, SigVal::Int(42));
    }

    #[test]
    fn test_detach_sends_disconnect_pulse() {
        let kernel = SimulatedKernel::new();
        let chid = kernel.channel_create(ChannelFlags::DISCONNECT).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();
        kernel.connect_detach(coid).unwrap();

        let mut buf = [0u8; 64];
        let (rcvid, _) = kernel.msg_receive(chid, &mut buf).unwrap();
        assert!(rcvid.is_pulse());
        assert_eq!(Pulse::read_from(&buf).unwrap().code, pulse_code::DISCONNECT);
        assert_eq!(
            kernel.connect_detach(coid),
            Err(KernelError::ConnectionNotFound(coid))
        );
    }

    #[test]
    fn test_detach_without_flag_is_silent() {
        let kernel = SimulatedKernel::new();
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();
        kernel.connect_detach(coid).unwrap();
        assert_eq!(kernel.queued_on(chid), 0);
    }

    #[test]
    fn test_name_attach_open_detach() {
        let kernel = SimulatedKernel::new();
        let attachment = kernel.name_attach("svc", NameScope::Local).unwrap();
        assert!(kernel.path_exists("/dev/name/local/svc"));
        assert_eq!(
            kernel.name_attach("svc", NameScope::Local).map(|a| a.chid),
            Err(KernelError::NameInUse("/dev/name/local/svc".to_string()))
        );
        assert_eq!(kernel.channel_count(), 1);

        let coid = kernel.name_open("svc", NameScope::Local).unwrap();
        assert!(coid.is_valid());
        assert!(matches!(
            kernel.name_open("svc", NameScope::Global),
            Err(KernelError::NameNotFound(_))
        ));

        kernel.name_close(coid).unwrap();
        kernel.name_detach(&attachment).unwrap();
        assert!(!kernel.path_exists("/dev/name/local/svc"));
        assert_eq!(kernel.channel_count(), 0);
    }

    #[test]
    fn test_path_open_returns_remainder() {
        let kernel = SimulatedKernel::new();
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        kernel.path_attach("/dev/gps", chid).unwrap();
        let (coid, rest) = kernel.path_open("/dev/gps/fix").unwrap();
        assert!(coid.is_valid());
        assert_eq!(rest, "fix");
    }

    #[test]
    fn test_destroy_channel_fails_blocked_sender() {
        let kernel = Arc::new(SimulatedKernel::new());
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();

        let client = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || kernel.msg_send(coid, b"x", &mut []))
        };
        while kernel.queued_on(chid) == 0 {
            thread::yield_now();
        }
        kernel.channel_destroy(chid).unwrap();
        assert_eq!(client.join().unwrap(), Err(KernelError::ChannelNotFound(chid)));
    }

    #[test]
    fn test_destroy_channel_wakes_receiver() {
        let kernel = Arc::new(SimulatedKernel::new());
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let server = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || kernel.msg_receive(chid, &mut [0u8; 8]).map(|(r, _)| r))
        };
        thread::sleep(std::time::Duration::from_millis(10));
        kernel.channel_destroy(chid).unwrap();
        assert_eq!(server.join().unwrap(), Err(KernelError::ChannelNotFound(chid)));
    }

    #[test]
    fn test_interrupt_queued_send() {
        let kernel = Arc::new(SimulatedKernel::new());
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();

        let client = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || kernel.msg_send(coid, b"x", &mut []))
        };
        while kernel.queued_on(chid) == 0 {
            thread::yield_now();
        }
        assert!(kernel.interrupt_send(coid));
        assert_eq!(client.join().unwrap(), Err(KernelError::Interrupted));
        assert_eq!(kernel.queued_on(chid), 0);
    }

    #[test]
    fn test_interrupt_received_send_pulses_server() {
        let kernel = Arc::new(SimulatedKernel::new());
        let chid = kernel.channel_create(ChannelFlags::UNBLOCK).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();

        let client = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || kernel.msg_send(coid, b"slow", &mut []))
        };
        let mut buf = [0u8; 64];
        let (rcvid, _) = kernel.msg_receive(chid, &mut buf).unwrap();
        assert!(kernel.interrupt_send(coid));

        let (pulse_rcvid, _) = kernel.msg_receive(chid, &mut buf).unwrap();
        assert!(pulse_rcvid.is_pulse());
        let pulse = Pulse::read_from(&buf).unwrap();
        assert_eq!(pulse.code, pulse_code::UNBLOCK);
        assert_eq!(pulse.value.as_int(), rcvid.as_raw());

        kernel.msg_error(rcvid, errno::EINTR).unwrap();
        assert_eq!(client.join().unwrap(), Err(KernelError::Interrupted));
    }

    #[test]
    fn test_fault_plan_interrupts_send() {
        let kernel = SimulatedKernel::new()
            .with_fault_plan(FaultPlan::new().with_message_fault(MessageFault::InterruptNextSend { count: 1 }));
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();
        assert_eq!(kernel.msg_send(coid, b"x", &mut []), Err(KernelError::Interrupted));
        assert_eq!(kernel.sends_interrupted(), 1);
    }

    #[test]
    fn test_fault_plan_exhausts_channels() {
        let kernel = SimulatedKernel::new()
            .with_fault_plan(FaultPlan::new().with_resource_fault(ResourceFault::ExhaustChannels));
        assert!(matches!(
            kernel.channel_create(ChannelFlags::empty()),
            Err(KernelError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_timer_delivers_pulse() {
        let kernel = SimulatedKernel::new();
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, SIDE_CHANNEL, 0).unwrap();
        let event = SigEvent::pulse(coid, 10, 3, SigVal::Int(11));
        let id = kernel.timer_create(event).unwrap();
        kernel
            .timer_settime(id, false, TimerSpec::from_secs_f64(0.1, 0.1).unwrap())
            .unwrap();

        kernel.advance_time(Duration::from_millis(250));
        assert_eq!(kernel.queued_on(chid), 2);
        assert_eq!(kernel.timer(id).unwrap().expirations(), 2);

        kernel.timer_delete(id).unwrap();
        kernel.advance_time(Duration::from_secs(1));
        assert_eq!(kernel.queued_on(chid), 2);
    }

    #[test]
    fn test_interrupt_wait_and_mask() {
        let kernel = Arc::new(SimulatedKernel::new());
        let id = kernel
            .interrupt_attach_event(5, SigEvent::Interrupt, 0)
            .unwrap();

        let waiter = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || kernel.interrupt_wait(id))
        };
        thread::sleep(std::time::Duration::from_millis(10));
        kernel.raise_interrupt(5);
        assert_eq!(waiter.join().unwrap(), Ok(()));
        assert_eq!(kernel.interrupt_mask_count(id), Some(1));
        assert_eq!(kernel.interrupt_unmask(5, id).unwrap(), 0);
        kernel.interrupt_detach(id).unwrap();
        assert_eq!(kernel.interrupt_wait(id), Err(KernelError::InterruptNotFound(id)));
    }

    #[test]
    fn test_receive_ids_do_not_accumulate() {
        let kernel = Arc::new(SimulatedKernel::new());
        let chid = kernel.channel_create(ChannelFlags::empty()).unwrap();
        let coid = kernel.connect_attach(local(), kernel.pid(), chid, 0, 0).unwrap();

        let client = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || {
                let mut reply = [0u8; 8];
                for _ in 0..500 {
                    kernel.msg_send(coid, b"tick", &mut reply).unwrap();
                }
            })
        };

        let mut buf = [0u8; 32];
        let mut last = ReceiveId::from_raw(0);
        for _ in 0..500 {
            let (rcvid, _) = kernel.msg_receive(chid, &mut buf).unwrap();
            kernel.msg_reply(rcvid, 0, b"").unwrap();
            last = rcvid;
        }
        client.join().unwrap();

        assert_eq!(kernel.pending_transaction_count(), 0);
        assert_eq!(kernel.issued_receive_count(), 1);
        let event = SigEvent::pulse(coid, 10, 2, SigVal::Int(0));
        assert!(kernel.msg_deliver_event(last, &event).is_ok());

        kernel.connect_detach(coid).unwrap();
        assert_eq!(kernel.issued_receive_count(), 0);
        assert_eq!(
            kernel.msg_deliver_event(last, &event),
            Err(KernelError::StaleReceiveId(last))
        );
    }

    #[test]
    fn test_deliver_event_requires_issued_rcvid() {
        let kernel = SimulatedKernel::new();
        let rcvid = ReceiveId::from_raw(77);
        assert_eq!(
            kernel.msg_deliver_event(rcvid, &SigEvent::Unblock),
            Err(KernelError::StaleReceiveId(rcvid))
        );
    }
}
