//! Timer collaborator interface
//!
//! Timers never call back into user code. An armed timer fires its event,
//! usually a pulse, which arrives through the ordinary receive path.

use crate::{Duration, KernelError};
use core_types::TimerId;
use ipc::SigEvent;
use serde::{Deserialize, Serialize};

/// First expiry and repeat interval of a timer (`itimerspec`)
///
/// A zero `value` disarms the timer; a zero `interval` makes it one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSpec {
    pub value: Duration,
    pub interval: Duration,
}

impl TimerSpec {
    /// A spec that disarms the timer
    pub const DISARMED: TimerSpec = TimerSpec {
        value: Duration::from_nanos(0),
        interval: Duration::from_nanos(0),
    };

    /// Creates a spec from explicit durations
    pub fn new(value: Duration, interval: Duration) -> Self {
        Self { value, interval }
    }

    /// Creates a spec from fractional seconds
    ///
    /// Each value is split into whole seconds and nanoseconds. Negative
    /// and non-finite values are rejected.
    pub fn from_secs_f64(start: f64, repeat: f64) -> Result<Self, KernelError> {
        Ok(Self {
            value: secs_to_duration(start)?,
            interval: secs_to_duration(repeat)?,
        })
    }

    /// True when this spec disarms the timer
    pub fn is_disarmed(&self) -> bool {
        self.value.as_nanos() == 0
    }
}

fn secs_to_duration(secs: f64) -> Result<Duration, KernelError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(KernelError::InvalidArgument(format!(
            "timer seconds must be finite and non-negative, got {}",
            secs
        )));
    }
    let whole = secs.trunc() as u64;
    let nanos = ((secs - secs.trunc()) * 1_000_000_000.0).round() as u64;
    Ok(Duration::from_secs(whole) + Duration::from_nanos(nanos))
}

/// Kernel timers
pub trait TimerApi: Send + Sync {
    /// Creates a disarmed timer that fires `event`
    fn timer_create(&self, event: SigEvent) -> Result<TimerId, KernelError>;

    /// Arms or disarms a timer; `absolute` reads `spec.value` as a time
    /// since the kernel epoch instead of a delay
    fn timer_settime(&self, id: TimerId, absolute: bool, spec: TimerSpec)
        -> Result<(), KernelError>;

    /// Destroys a timer
    fn timer_delete(&self, id: TimerId) -> Result<(), KernelError>;
}
