//! Pulse bridge
//!
//! Interrupts and timers never call user code. They deliver pulses to a
//! channel, and the bridge turns what arrives there into [`BridgeEvent`]s.
//! The bridge owns its channel and a connection to it, so event sources
//! only need the [`SigEvent`] it hands out.

use crate::{EventError, Interrupt, Timer};
use core_types::{errno, ReceiveId, ServerConnectionId};
use ipc::{EncodingMode, Pulse, PulseKind, SigEvent, SigVal, DEFAULT_PULSE_PRIORITY};
use kernel_api::{ChannelFlags, InterruptApi, KernelApi, TimerApi, INTR_FLAGS_TRK_MSK};
use messaging::{Messenger, Received, TransportConfig};
use std::sync::Arc;

/// A pulse sorted by what sent it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    /// A blocked client asked to be unblocked; carries its receive id
    Unblock {
        rcvid: ReceiveId,
        scoid: ServerConnectionId,
    },
    /// A client connection went away
    Disconnect { scoid: ServerConnectionId },
    ThreadDeath { value: SigVal },
    ConnectionDeath { value: SigVal },
    /// Another kernel-reserved code
    System { code: i8, value: SigVal },
    /// A user pulse, such as a timer tick or interrupt notification
    User {
        code: i8,
        value: SigVal,
        scoid: ServerConnectionId,
    },
}

impl BridgeEvent {
    /// Sorts a pulse by its code
    pub fn classify(pulse: &Pulse) -> Self {
        match pulse.kind() {
            PulseKind::Unblock => BridgeEvent::Unblock {
                rcvid: ReceiveId::from_raw(pulse.value.as_int()),
                scoid: pulse.scoid,
            },
            PulseKind::Disconnect => BridgeEvent::Disconnect { scoid: pulse.scoid },
            PulseKind::ThreadDeath => BridgeEvent::ThreadDeath { value: pulse.value },
            PulseKind::ConnectionDeath => BridgeEvent::ConnectionDeath { value: pulse.value },
            PulseKind::System(code) => BridgeEvent::System {
                code,
                value: pulse.value,
            },
            PulseKind::User(code) => BridgeEvent::User {
                code,
                value: pulse.value,
                scoid: pulse.scoid,
            },
        }
    }

    /// True for pulses generated by the kernel
    pub fn is_system(&self) -> bool {
        !matches!(self, BridgeEvent::User { .. })
    }
}

/// A private channel receiving pulses from event sources
pub struct EventBridge<K: KernelApi> {
    messenger: Messenger<K>,
}

impl<K: KernelApi> EventBridge<K> {
    /// Creates the channel and connects to it
    ///
    /// The channel is destroyed again when the connection cannot be made.
    pub fn new(kernel: Arc<K>) -> Result<Self, EventError> {
        let mut messenger = Messenger::new(kernel, TransportConfig::raw());
        let connector = messenger.connector_mut();
        if let Err(err) = connector.create_and_attach(ChannelFlags::empty()) {
            connector.destroy_channel()?;
            return Err(err.into());
        }
        Ok(Self { messenger })
    }

    pub fn kernel(&self) -> &Arc<K> {
        self.messenger.kernel()
    }

    /// An event that delivers pulse `code` with `value` to this bridge
    pub fn pulse_event(&self, code: i8, value: SigVal) -> Result<SigEvent, EventError> {
        let coid = self
            .messenger
            .connector()
            .coid()
            .ok_or(EventError::NotAttached)?;
        Ok(SigEvent::pulse(coid, DEFAULT_PULSE_PRIORITY, code, value))
    }

    /// Queues a pulse to this bridge directly
    pub fn notify(&self, code: i8, value: SigVal) -> Result<(), EventError> {
        self.messenger
            .send_pulse(DEFAULT_PULSE_PRIORITY, code, value)?;
        Ok(())
    }

    /// Blocks until the next pulse arrives
    ///
    /// Messages do not belong on a bridge channel; they are answered with
    /// `ENOSYS` and skipped.
    pub fn next_event(&mut self) -> Result<BridgeEvent, EventError> {
        loop {
            match self.messenger.receive(0, Some(EncodingMode::Raw))? {
                Received::Pulse { pulse, .. } => return Ok(BridgeEvent::classify(&pulse)),
                Received::Message { rcvid, .. } => {
                    log::warn!("event bridge: unexpected message {}", rcvid);
                    self.messenger.error(rcvid, errno::ENOSYS)?;
                }
            }
        }
    }

    /// Destroys the channel and its connection
    pub fn close(mut self) -> Result<(), EventError> {
        let connector = self.messenger.connector_mut();
        connector.detach()?;
        connector.destroy_channel()?;
        Ok(())
    }
}

impl<K: KernelApi + TimerApi> EventBridge<K> {
    /// Starts a relative timer that pulses this bridge with `code`
    pub fn timer(&self, code: i8, start: f64, repeat: f64) -> Result<Timer<K>, EventError> {
        let event = self.pulse_event(code, SigVal::Int(0))?;
        Timer::start(Arc::clone(self.kernel()), event, start, repeat)
    }
}

impl<K: KernelApi + InterruptApi> EventBridge<K> {
    /// Attaches interrupt line `irq` so that it pulses this bridge with `code`
    ///
    /// The line stays masked after each interrupt until the returned
    /// wrapper unmasks it.
    pub fn interrupt(&self, irq: u32, code: i8) -> Result<Interrupt<K>, EventError> {
        let event = self.pulse_event(code, SigVal::Int(irq as i32))?;
        let mut interrupt = Interrupt::new(Arc::clone(self.kernel()));
        interrupt.attach_event(Some(irq), Some(event), INTR_FLAGS_TRK_MSK)?;
        Ok(interrupt)
    }
}
