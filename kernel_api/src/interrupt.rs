//! Interrupt collaborator interface

use crate::KernelError;
use core_types::InterruptId;
use ipc::SigEvent;

/// Track mask count across attach and detach
pub const INTR_FLAGS_TRK_MSK: u32 = 8;
/// Attach the interrupt to the process rather than the thread
pub const INTR_FLAGS_PROCESS: u32 = 4;
/// Put the handler at the end of the chain
pub const INTR_FLAGS_END: u32 = 1;

/// Hardware interrupt attachment
///
/// A fired interrupt masks its line and delivers the attached event. The
/// line stays masked until the owner unmasks it.
pub trait InterruptApi: Send + Sync {
    /// Attaches `event` to interrupt line `irq`
    fn interrupt_attach_event(
        &self,
        irq: u32,
        event: SigEvent,
        flags: u32,
    ) -> Result<InterruptId, KernelError>;

    /// Blocks until the attachment fires an interrupt event
    fn interrupt_wait(&self, id: InterruptId) -> Result<(), KernelError>;

    /// Increments the mask count of `irq`
    fn interrupt_mask(&self, irq: u32, id: InterruptId) -> Result<u32, KernelError>;

    /// Decrements the mask count of `irq`
    fn interrupt_unmask(&self, irq: u32, id: InterruptId) -> Result<u32, KernelError>;

    /// Removes the attachment
    fn interrupt_detach(&self, id: InterruptId) -> Result<(), KernelError>;
}
