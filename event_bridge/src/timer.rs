//! Timer wrapper
//!
//! Times are given as fractional seconds `(start, repeat)`. A zero repeat
//! makes a one-shot timer; stopping sets both to zero.

use crate::EventError;
use core_types::TimerId;
use ipc::SigEvent;
use kernel_api::{TimerApi, TimerSpec};
use std::sync::Arc;

/// A kernel timer and the event it fires
pub struct Timer<K: TimerApi> {
    kernel: Arc<K>,
    id: Option<TimerId>,
    event: Option<SigEvent>,
    times: Option<(f64, f64)>,
    absolute: bool,
}

impl<K: TimerApi> Timer<K> {
    pub fn new(kernel: Arc<K>) -> Self {
        Self {
            kernel,
            id: None,
            event: None,
            times: None,
            absolute: false,
        }
    }

    /// Creates and arms a relative timer in one step
    pub fn start(kernel: Arc<K>, event: SigEvent, start: f64, repeat: f64) -> Result<Self, EventError> {
        let mut timer = Self::new(kernel).with_event(event).with_times(start, repeat);
        timer.create(None)?;
        timer.settime(None, None)?;
        Ok(timer)
    }

    pub fn with_event(mut self, event: SigEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_times(mut self, start: f64, repeat: f64) -> Self {
        self.times = Some((start, repeat));
        self
    }

    /// Reads the start time as an absolute time instead of a delay
    pub fn with_absolute(mut self, absolute: bool) -> Self {
        self.absolute = absolute;
        self
    }

    pub fn id(&self) -> Option<TimerId> {
        self.id
    }

    /// Creates the kernel timer with `event` or the stored event
    pub fn create(&mut self, event: Option<SigEvent>) -> Result<TimerId, EventError> {
        if let Some(event) = event {
            self.event = Some(event);
        }
        let event = self.event.ok_or(EventError::NoEvent)?;
        let id = self.kernel.timer_create(event)?;
        self.id = Some(id);
        Ok(id)
    }

    /// Arms the timer
    ///
    /// Arguments left `None` fall back to the stored values.
    pub fn settime(&mut self, absolute: Option<bool>, times: Option<(f64, f64)>) -> Result<(), EventError> {
        if let Some(absolute) = absolute {
            self.absolute = absolute;
        }
        if let Some(times) = times {
            self.times = Some(times);
        }
        let (start, repeat) = self.times.ok_or(EventError::NoTimes)?;
        let id = self.id.ok_or(EventError::NotAttached)?;
        let spec = TimerSpec::from_secs_f64(start, repeat)?;
        self.kernel.timer_settime(id, self.absolute, spec)?;
        log::trace!("{} armed: start {}s repeat {}s", id, start, repeat);
        Ok(())
    }

    /// Disarms the timer without destroying it
    pub fn stop(&mut self) -> Result<(), EventError> {
        self.settime(Some(false), Some((0.0, 0.0)))
    }

    /// Destroys the kernel timer
    pub fn delete(&mut self) -> Result<(), EventError> {
        let id = self.id.take().ok_or(EventError::NotAttached)?;
        Ok(self.kernel.timer_delete(id)?)
    }
}
