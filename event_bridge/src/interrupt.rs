//! Interrupt wrapper
//!
//! One [`Interrupt`] tracks one attachment. Attaching again first unmasks
//! and detaches the previous attachment. [`Interrupt::run`] is the usual
//! service loop: wait, unmask, call the handler, repeat.

use crate::EventError;
use core_types::InterruptId;
use ipc::SigEvent;
use kernel_api::{InterruptApi, INTR_FLAGS_TRK_MSK};
use std::fmt::Display;
use std::sync::Arc;

/// An interrupt line and its current attachment
pub struct Interrupt<K: InterruptApi> {
    kernel: Arc<K>,
    irq: Option<u32>,
    event: Option<SigEvent>,
    flags: u32,
    id: Option<InterruptId>,
}

impl<K: InterruptApi> Interrupt<K> {
    /// Creates an unattached wrapper; mask-count tracking is on by default
    pub fn new(kernel: Arc<K>) -> Self {
        Self {
            kernel,
            irq: None,
            event: None,
            flags: INTR_FLAGS_TRK_MSK,
            id: None,
        }
    }

    /// Sets the line used when `attach_event` is called without one
    pub fn with_irq(mut self, irq: u32) -> Self {
        self.irq = Some(irq);
        self
    }

    /// Sets the event used when `attach_event` is called without one
    pub fn with_event(mut self, event: SigEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn irq(&self) -> Option<u32> {
        self.irq
    }

    pub fn id(&self) -> Option<InterruptId> {
        self.id
    }

    pub fn is_attached(&self) -> bool {
        self.id.is_some()
    }

    /// Attaches an event to a line
    ///
    /// Arguments left `None` fall back to the stored line and event. An
    /// existing attachment is unmasked and detached first.
    pub fn attach_event(
        &mut self,
        irq: Option<u32>,
        event: Option<SigEvent>,
        flags: u32,
    ) -> Result<InterruptId, EventError> {
        if let Some(irq) = irq {
            self.irq = Some(irq);
        }
        if let Some(event) = event {
            self.event = Some(event);
        }
        self.flags = flags;
        let irq = self.irq.ok_or(EventError::NoIrq)?;
        let event = self.event.ok_or(EventError::NoEvent)?;

        if self.id.is_some() {
            self.unmask()?;
            self.detach()?;
        }
        let id = self.kernel.interrupt_attach_event(irq, event, flags)?;
        log::debug!("irq {}: attached {} as {}", irq, event, id);
        self.id = Some(id);
        Ok(id)
    }

    /// Blocks until the attachment fires
    pub fn wait(&self) -> Result<(), EventError> {
        let id = self.id.ok_or(EventError::NotAttached)?;
        Ok(self.kernel.interrupt_wait(id)?)
    }

    /// Masks the line; returns the new mask depth
    pub fn mask(&self) -> Result<u32, EventError> {
        let (irq, id) = self.attached()?;
        Ok(self.kernel.interrupt_mask(irq, id)?)
    }

    /// Unmasks the line; returns the new mask depth
    pub fn unmask(&self) -> Result<u32, EventError> {
        let (irq, id) = self.attached()?;
        Ok(self.kernel.interrupt_unmask(irq, id)?)
    }

    /// Removes the attachment
    pub fn detach(&mut self) -> Result<(), EventError> {
        let id = self.id.take().ok_or(EventError::NotAttached)?;
        Ok(self.kernel.interrupt_detach(id)?)
    }

    /// Services interrupts on `irq` (or the stored line) until told to stop
    ///
    /// Each interrupt unmasks the line, then calls `handler`. The loop ends
    /// when the handler returns `Ok(true)`, cleaning up the attachment. A
    /// handler error or a failed wait also cleans up and is returned.
    /// Returns the number of interrupts handled.
    pub fn run<F, E>(&mut self, irq: Option<u32>, mut handler: F) -> Result<u64, EventError>
    where
        F: FnMut() -> Result<bool, E>,
        E: Display,
    {
        self.attach_event(irq, Some(SigEvent::Interrupt), self.flags)?;
        let mut handled = 0;
        loop {
            if let Err(err) = self.wait() {
                log::warn!("irq wait failed: {}", err);
                self.cleanup();
                return Err(err);
            }
            self.unmask()?;
            handled += 1;
            match handler() {
                Ok(false) => {}
                Ok(true) => {
                    self.cleanup();
                    return Ok(handled);
                }
                Err(err) => {
                    log::error!("interrupt handler failed, detaching: {}", err);
                    self.cleanup();
                    return Err(EventError::HandlerFailed(err.to_string()));
                }
            }
        }
    }

    fn attached(&self) -> Result<(u32, InterruptId), EventError> {
        match (self.irq, self.id) {
            (Some(irq), Some(id)) => Ok((irq, id)),
            _ => Err(EventError::NotAttached),
        }
    }

    fn cleanup(&mut self) {
        if let Err(err) = self.unmask() {
            log::debug!("cleanup unmask: {}", err);
        }
        if let Err(err) = self.detach() {
            log::debug!("cleanup detach: {}", err);
        }
    }
}
