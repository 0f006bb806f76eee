//! Simulated interrupt controller
//!
//! Tests raise interrupt lines by number. Each unmasked attachment on the
//! line masks itself and hands back its event for the kernel to deliver.

use core_types::InterruptId;
use ipc::SigEvent;
use kernel_api::KernelError;
use std::collections::BTreeMap;

/// One attachment of an event to an interrupt line
#[derive(Debug, Clone)]
pub struct Attachment {
    irq: u32,
    event: SigEvent,
    flags: u32,
    mask_count: u32,
    pending: u32,
    fired: u64,
}

impl Attachment {
    pub fn irq(&self) -> u32 {
        self.irq
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Current mask depth; zero means the line is live
    pub fn mask_count(&self) -> u32 {
        self.mask_count
    }

    /// Total interrupts delivered through this attachment
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

/// Every interrupt attachment in the simulated machine
#[derive(Debug, Default)]
pub struct InterruptController {
    attachments: BTreeMap<InterruptId, Attachment>,
    next_id: i32,
    missed: u64,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `event` to line `irq`
    pub fn attach(&mut self, irq: u32, event: SigEvent, flags: u32) -> InterruptId {
        let id = InterruptId::from_raw(self.next_id);
        self.next_id += 1;
        self.attachments.insert(
            id,
            Attachment {
                irq,
                event,
                flags,
                mask_count: 0,
                pending: 0,
                fired: 0,
            },
        );
        id
    }

    /// Removes an attachment
    pub fn detach(&mut self, id: InterruptId) -> Result<(), KernelError> {
        self.attachments
            .remove(&id)
            .map(|_| ())
            .ok_or(KernelError::InterruptNotFound(id))
    }

    pub fn get(&self, id: InterruptId) -> Option<&Attachment> {
        self.attachments.get(&id)
    }

    /// Raises line `irq`
    ///
    /// Every live attachment on the line is masked and its event returned.
    /// Interrupt-kind events are latched for `take_pending` instead.
    pub fn raise(&mut self, irq: u32) -> Vec<SigEvent> {
        let mut events = Vec::new();
        for attachment in self.attachments.values_mut().filter(|a| a.irq == irq) {
            if attachment.mask_count > 0 {
                self.missed += 1;
                continue;
            }
            attachment.mask_count += 1;
            attachment.fired += 1;
            match attachment.event {
                SigEvent::Interrupt => attachment.pending += 1,
                other => events.push(other),
            }
        }
        events
    }

    /// Consumes one latched interrupt for `id`
    ///
    /// Returns `Ok(false)` when nothing is pending yet.
    pub fn take_pending(&mut self, id: InterruptId) -> Result<bool, KernelError> {
        let attachment = self
            .attachments
            .get_mut(&id)
            .ok_or(KernelError::InterruptNotFound(id))?;
        if attachment.pending == 0 {
            return Ok(false);
        }
        attachment.pending -= 1;
        Ok(true)
    }

    /// Increments the mask depth of an attachment
    pub fn mask(&mut self, irq: u32, id: InterruptId) -> Result<u32, KernelError> {
        let attachment = self.attachment_on(irq, id)?;
        attachment.mask_count += 1;
        Ok(attachment.mask_count)
    }

    /// Decrements the mask depth of an attachment
    pub fn unmask(&mut self, irq: u32, id: InterruptId) -> Result<u32, KernelError> {
        let attachment = self.attachment_on(irq, id)?;
        attachment.mask_count = attachment.mask_count.saturating_sub(1);
        Ok(attachment.mask_count)
    }

    /// True when some attachment on `irq` would take the next interrupt
    pub fn is_ready(&self, irq: u32) -> bool {
        self.attachments
            .values()
            .any(|a| a.irq == irq && a.mask_count == 0)
    }

    /// Interrupts raised while their line was masked
    pub fn missed(&self) -> u64 {
        self.missed
    }

    fn attachment_on(&mut self, irq: u32, id: InterruptId) -> Result<&mut Attachment, KernelError> {
        match self.attachments.get_mut(&id) {
            Some(attachment) if attachment.irq == irq => Ok(attachment),
            Some(_) => Err(KernelError::InvalidArgument(format!(
                "{} is not attached to irq {}",
                id, irq
            ))),
            None => Err(KernelError::InterruptNotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::ConnectionId;
    use ipc::SigVal;

    #[test]
    fn test_raise_masks_line() {
        let mut controller = InterruptController::new();
        let id = controller.attach(3, SigEvent::Interrupt, 0);

        assert!(controller.raise(3).is_empty());
        assert_eq!(controller.get(id).unwrap().mask_count(), 1);
        assert!(controller.take_pending(id).unwrap());
        assert!(!controller.take_pending(id).unwrap());

        controller.raise(3);
        assert_eq!(controller.missed(), 1);
    }

    #[test]
    fn test_unmask_rearms() {
        let mut controller = InterruptController::new();
        let id = controller.attach(4, SigEvent::Interrupt, 0);
        controller.raise(4);
        assert!(!controller.is_ready(4));
        assert_eq!(controller.unmask(4, id).unwrap(), 0);
        assert!(controller.is_ready(4));
        controller.raise(4);
        assert_eq!(controller.get(id).unwrap().fired(), 2);
    }

    #[test]
    fn test_pulse_event_returned() {
        let mut controller = InterruptController::new();
        let event = SigEvent::pulse(ConnectionId::from_raw(2), 21, 5, SigVal::Int(4));
        controller.attach(7, event, 0);
        assert_eq!(controller.raise(7), vec![event]);
        assert!(controller.raise(8).is_empty());
    }

    #[test]
    fn test_mask_wrong_irq() {
        let mut controller = InterruptController::new();
        let id = controller.attach(1, SigEvent::Interrupt, 0);
        assert!(matches!(
            controller.mask(2, id),
            Err(KernelError::InvalidArgument(_))
        ));
        assert_eq!(controller.mask(1, id).unwrap(), 1);
    }

    #[test]
    fn test_detach_unknown() {
        let mut controller = InterruptController::new();
        let id = InterruptId::from_raw(9);
        assert_eq!(controller.detach(id), Err(KernelError::InterruptNotFound(id)));
    }
}
