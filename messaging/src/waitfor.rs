//! Waiting for a name or path to appear

use core_types::NameScope;
use kernel_api::{Duration, KernelApi};

/// Interval between namespace checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Blocks until `name` is attached in `scope`
///
/// Polls every [`POLL_INTERVAL`] with no upper bound. Returns the number of
/// intervals slept.
pub fn wait_for_attach<K: KernelApi + ?Sized>(kernel: &K, name: &str, scope: NameScope) -> u64 {
    wait_for_path(kernel, &scope.path_of(name))
}

/// Blocks until `path` is registered
pub fn wait_for_path<K: KernelApi + ?Sized>(kernel: &K, path: &str) -> u64 {
    let mut polls = 0;
    while !kernel.path_exists(path) {
        if polls == 0 {
            log::debug!("waiting for {}", path);
        }
        kernel.sleep(POLL_INTERVAL);
        polls += 1;
    }
    polls
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_kernel::SimulatedKernel;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_present_name_returns_at_once() {
        let kernel = SimulatedKernel::new();
        kernel.name_attach("ready", NameScope::Local).unwrap();
        assert_eq!(wait_for_attach(&kernel, "ready", NameScope::Local), 0);
    }

    #[test]
    fn test_waits_for_late_attach() {
        let kernel = Arc::new(SimulatedKernel::new());
        let waiter = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || wait_for_attach(&*kernel, "late", NameScope::Global))
        };
        thread::sleep(std::time::Duration::from_millis(5));
        kernel.name_attach("late", NameScope::Global).unwrap();
        waiter.join().unwrap();
        assert!(kernel.path_exists("/dev/name/global/late"));
    }

    #[test]
    fn test_poll_advances_simulated_time() {
        let kernel = Arc::new(SimulatedKernel::new());
        let waiter = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || wait_for_path(&*kernel, "/dev/slow"))
        };
        sim_kernel::test_utils::wait_until(|| kernel.now().as_nanos() >= POLL_INTERVAL.as_nanos() * 3);
        let chid = kernel.channel_create(kernel_api::ChannelFlags::empty()).unwrap();
        kernel.path_attach("/dev/slow", chid).unwrap();
        let polls = waiter.join().unwrap();
        assert!(polls >= 3);
    }
}
