//! End-to-end Test Utilities
//!
//! Shared helpers for the integration tests under `tests/`.
//!
//! ## Test Philosophy
//!
//! - **Real blocking**: servers run on their own threads and clients block
//!   in send exactly as they would against a kernel
//! - **One kernel per test**: nothing is shared between tests except the
//!   process-wide logger
//! - **Observable cleanup**: tests that release handles check the kernel
//!   counts of channels, connections and paths afterwards

use resmgr::{Dispatched, ResourceManager};
use services_logger::MemoryLogger;
use sim_kernel::SimulatedKernel;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Boots a fresh simulated kernel with logging installed
pub fn boot() -> Arc<SimulatedKernel> {
    services_logger::init();
    Arc::new(SimulatedKernel::new())
}

/// The process-wide test logger
pub fn logger() -> &'static MemoryLogger {
    services_logger::init()
}

/// Dispatches `count` items on a worker thread, then hands the manager back
pub fn serve_resource<S>(
    mut manager: ResourceManager<SimulatedKernel, S>,
    count: usize,
) -> JoinHandle<(ResourceManager<SimulatedKernel, S>, Vec<Dispatched>)>
where
    S: Send + 'static,
{
    thread::Builder::new()
        .name(format!("resmgr-{}", manager.path()))
        .spawn(move || {
            let mut dispatched = Vec::with_capacity(count);
            for _ in 0..count {
                match manager.dispatch_once() {
                    Ok(item) => dispatched.push(item),
                    Err(err) => panic!("dispatch failed: {}", err),
                }
            }
            (manager, dispatched)
        })
        .expect("spawn resource manager thread")
}
