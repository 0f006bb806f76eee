//! Test utilities for simulated-kernel tests
//!
//! Helpers shared by unit tests and the end-to-end test crate.

use crate::fault_injection::FaultPlan;
use crate::SimulatedKernel;
use std::sync::Arc;

/// Runs a test with a fault plan applied
///
/// Creates a kernel with the given fault plan and passes it to the test
/// closure.
///
/// # Example
///
/// ```
/// use sim_kernel::test_utils::with_fault_plan;
/// use sim_kernel::fault_injection::{FaultPlan, MessageFault};
///
/// with_fault_plan(
///     FaultPlan::new().with_message_fault(MessageFault::DropNextPulse { count: 1 }),
///     |kernel| {
///         assert_eq!(kernel.channel_count(), 0);
///     }
/// );
/// ```
pub fn with_fault_plan<F>(plan: FaultPlan, f: F)
where
    F: FnOnce(Arc<SimulatedKernel>),
{
    let kernel = Arc::new(SimulatedKernel::new().with_fault_plan(plan));
    f(kernel);
}

/// Spins until `condition` holds, yielding between checks
///
/// Used to wait for another thread to reach a blocking call.
pub fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    while !condition() {
        std::thread::yield_now();
    }
}
