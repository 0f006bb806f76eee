//! Kernel time
//!
//! Kernel time is a nanosecond counter from boot. Timer deadlines and
//! attribute timestamps both read it through [`KernelApi::now`], so a
//! simulated kernel can move it forward on demand.
//!
//! [`KernelApi::now`]: crate::KernelApi::now

use serde::{Deserialize, Serialize};
use std::ops::Add;

/// A point on the kernel clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instant {
    nanos: u64,
}

impl Instant {
    /// Boot time
    pub const EPOCH: Instant = Instant { nanos: 0 };

    pub fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    pub fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Whole seconds since boot, the resolution of attribute timestamps
    pub fn as_secs_u32(&self) -> u32 {
        (self.nanos / NANOS_PER_SEC).min(u32::MAX as u64) as u32
    }

    /// Time elapsed since `earlier`; zero if `earlier` is later
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, duration: Duration) -> Instant {
        Instant::from_nanos(self.nanos.saturating_add(duration.nanos))
    }
}

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A span of kernel time
///
/// Kept apart from [`Instant`] so a relative timer value is never read as
/// an absolute one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Duration {
    nanos: u64,
}

impl Duration {
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self {
            nanos: secs * NANOS_PER_SEC,
        }
    }

    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    pub const fn is_zero(&self) -> bool {
        self.nanos == 0
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, other: Duration) -> Duration {
        Duration::from_nanos(self.nanos.saturating_add(other.nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_agree() {
        assert_eq!(Duration::from_secs(2), Duration::from_millis(2000));
        assert_eq!(Duration::from_millis(3).as_nanos(), 3_000_000);
        assert!(Duration::from_nanos(0).is_zero());
    }

    #[test]
    fn test_timestamp_seconds_truncate() {
        assert_eq!(Instant::from_nanos(3_500_000_000).as_secs_u32(), 3);
        assert_eq!(Instant::EPOCH.as_secs_u32(), 0);
    }

    #[test]
    fn test_deadline_arithmetic() {
        let deadline = Instant::EPOCH + Duration::from_millis(1500);
        assert_eq!(deadline.duration_since(Instant::EPOCH), Duration::from_millis(1500));
        assert_eq!(Instant::EPOCH.duration_since(deadline), Duration::from_nanos(0));
        assert_eq!(
            Duration::from_secs(1) + Duration::from_nanos(5),
            Duration::from_nanos(1_000_000_005)
        );
    }
}
