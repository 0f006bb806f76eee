//! # Simulated Timers
//!
//! Deterministic kernel timers driven by simulated time.
//!
//! ## Philosophy
//!
//! **Determinism enables thorough testing.**
//!
//! A timer never fires on its own. It fires when simulated time is moved
//! past its deadline, and every expiry in the skipped window is delivered
//! in order.

use core_types::TimerId;
use ipc::SigEvent;
use kernel_api::{Duration, Instant, KernelError, TimerSpec};
use std::collections::BTreeMap;

/// One kernel timer
#[derive(Debug, Clone)]
pub struct SimTimer {
    event: SigEvent,
    deadline: Option<Instant>,
    interval: Duration,
    expirations: u64,
}

impl SimTimer {
    /// True while the timer has a pending deadline
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Next expiry, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Number of times the timer has fired
    pub fn expirations(&self) -> u64 {
        self.expirations
    }
}

/// Table of every timer the kernel owns
///
/// # Examples
///
/// ```
/// use sim_kernel::timer::TimerTable;
/// use kernel_api::{Duration, Instant, TimerSpec};
/// use ipc::SigEvent;
///
/// let mut timers = TimerTable::new();
/// let id = timers.create(SigEvent::Unblock);
/// let spec = TimerSpec::new(Duration::from_millis(10), Duration::from_nanos(0));
/// timers.settime(id, Instant::EPOCH, false, spec).unwrap();
///
/// assert!(timers.collect_due(Instant::from_nanos(5_000_000)).is_empty());
/// assert_eq!(timers.collect_due(Instant::from_nanos(10_000_000)).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct TimerTable {
    timers: BTreeMap<TimerId, SimTimer>,
    next_id: i32,
}

impl TimerTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disarmed timer
    pub fn create(&mut self, event: SigEvent) -> TimerId {
        let id = TimerId::from_raw(self.next_id);
        self.next_id += 1;
        self.timers.insert(
            id,
            SimTimer {
                event,
                deadline: None,
                interval: Duration::from_nanos(0),
                expirations: 0,
            },
        );
        id
    }

    /// Arms or disarms a timer relative to `now`
    pub fn settime(
        &mut self,
        id: TimerId,
        now: Instant,
        absolute: bool,
        spec: TimerSpec,
    ) -> Result<(), KernelError> {
        let timer = self
            .timers
            .get_mut(&id)
            .ok_or(KernelError::TimerNotFound(id))?;
        timer.interval = spec.interval;
        timer.deadline = if spec.is_disarmed() {
            None
        } else if absolute {
            Some(Instant::from_nanos(spec.value.as_nanos()))
        } else {
            Some(now + spec.value)
        };
        Ok(())
    }

    /// Destroys a timer
    pub fn delete(&mut self, id: TimerId) -> Result<(), KernelError> {
        self.timers
            .remove(&id)
            .map(|_| ())
            .ok_or(KernelError::TimerNotFound(id))
    }

    /// Returns a timer by id
    pub fn get(&self, id: TimerId) -> Option<&SimTimer> {
        self.timers.get(&id)
    }

    /// Collects the events of every expiry at or before `now`
    ///
    /// Periodic timers are re-armed; one-shot timers are disarmed.
    pub fn collect_due(&mut self, now: Instant) -> Vec<SigEvent> {
        let mut due: Vec<(Instant, SigEvent)> = Vec::new();
        for timer in self.timers.values_mut() {
            while let Some(deadline) = timer.deadline {
                if deadline > now {
                    break;
                }
                due.push((deadline, timer.event));
                timer.expirations += 1;
                timer.deadline = if timer.interval.is_zero() {
                    None
                } else {
                    Some(deadline + timer.interval)
                };
            }
        }
        due.sort_by_key(|(deadline, _)| *deadline);
        due.into_iter().map(|(_, event)| event).collect()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().filter_map(|t| t.deadline).min()
    }

    /// Returns the number of timers
    pub fn count(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::ConnectionId;
    use ipc::SigVal;

    fn pulse_event(code: i8) -> SigEvent {
        SigEvent::pulse(ConnectionId::from_raw(1), 10, code, SigVal::Int(0))
    }

    fn at_millis(ms: u64) -> Instant {
        Instant::from_nanos(ms * 1_000_000)
    }

    #[test]
    fn test_new_timer_is_disarmed() {
        let mut timers = TimerTable::new();
        let id = timers.create(pulse_event(1));
        assert!(!timers.get(id).unwrap().is_armed());
        assert!(timers.collect_due(at_millis(1000)).is_empty());
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut timers = TimerTable::new();
        let id = timers.create(pulse_event(1));
        let spec = TimerSpec::from_secs_f64(0.5, 0.0).unwrap();
        timers.settime(id, Instant::EPOCH, false, spec).unwrap();

        assert!(timers.collect_due(at_millis(499)).is_empty());
        assert_eq!(timers.collect_due(at_millis(500)).len(), 1);
        assert!(timers.collect_due(at_millis(5000)).is_empty());
        assert_eq!(timers.get(id).unwrap().expirations(), 1);
    }

    #[test]
    fn test_periodic_catches_up() {
        let mut timers = TimerTable::new();
        let id = timers.create(pulse_event(2));
        let spec = TimerSpec::from_secs_f64(0.1, 0.1).unwrap();
        timers.settime(id, Instant::EPOCH, false, spec).unwrap();

        assert_eq!(timers.collect_due(at_millis(350)).len(), 3);
        assert_eq!(timers.get(id).unwrap().deadline(), Some(at_millis(400)));
    }

    #[test]
    fn test_absolute_deadline() {
        let mut timers = TimerTable::new();
        let id = timers.create(pulse_event(3));
        let spec = TimerSpec::new(Duration::from_millis(200), Duration::from_nanos(0));
        timers.settime(id, at_millis(150), true, spec).unwrap();
        assert_eq!(timers.next_deadline(), Some(at_millis(200)));
    }

    #[test]
    fn test_stop_disarms() {
        let mut timers = TimerTable::new();
        let id = timers.create(pulse_event(4));
        let spec = TimerSpec::from_secs_f64(1.0, 1.0).unwrap();
        timers.settime(id, Instant::EPOCH, false, spec).unwrap();
        timers
            .settime(id, Instant::EPOCH, false, TimerSpec::DISARMED)
            .unwrap();
        assert!(timers.collect_due(at_millis(10_000)).is_empty());
    }

    #[test]
    fn test_delete_unknown_timer() {
        let mut timers = TimerTable::new();
        let id = TimerId::from_raw(42);
        assert_eq!(timers.delete(id), Err(KernelError::TimerNotFound(id)));
    }

    #[test]
    fn test_events_ordered_by_deadline() {
        let mut timers = TimerTable::new();
        let late = timers.create(pulse_event(9));
        let early = timers.create(pulse_event(8));
        timers
            .settime(late, Instant::EPOCH, false, TimerSpec::from_secs_f64(0.3, 0.0).unwrap())
            .unwrap();
        timers
            .settime(early, Instant::EPOCH, false, TimerSpec::from_secs_f64(0.1, 0.0).unwrap())
            .unwrap();
        let events = timers.collect_due(at_millis(400));
        assert_eq!(events, vec![pulse_event(8), pulse_event(9)]);
    }
}
