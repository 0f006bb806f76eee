//! Deterministic fault injection for testing
//!
//! This module lets tests inject faults into the simulated kernel's
//! message-passing paths: interrupted sends, lost pulses and exhausted
//! kernel resources.
//!
//! ## Design Philosophy
//!
//! - **Deterministic**: Faults fire on counts, never at random
//! - **Composable**: A plan holds any number of faults
//! - **Test-focused**: Not intended for production use
//!
//! ## Example
//!
//! ```
//! use sim_kernel::fault_injection::{FaultPlan, MessageFault, ResourceFault};
//!
//! let plan = FaultPlan::new()
//!     .with_message_fault(MessageFault::InterruptNextSend { count: 1 })
//!     .with_resource_fault(ResourceFault::ExhaustChannels);
//! ```

use core_types::ChannelId;
use ipc::Pulse;
use std::collections::HashMap;

/// A fault to inject into message delivery
#[derive(Debug, Clone)]
pub enum MessageFault {
    /// Interrupt the next N sends on any channel before they are queued
    InterruptNextSend { count: usize },

    /// Interrupt the next N sends to a specific channel
    InterruptNextSendOnChannel { channel: ChannelId, count: usize },

    /// Drop the next N pulses on any channel
    DropNextPulse { count: usize },

    /// Drop every pulse carrying this code
    DropPulseCode { code: i8 },
}

/// A fault to inject into kernel resource allocation
#[derive(Debug, Clone)]
pub enum ResourceFault {
    /// Every channel creation fails
    ExhaustChannels,

    /// Every connection attach fails
    ExhaustConnections,
}

/// A plan describing all faults to inject
///
/// This is configured per-test and provides a deterministic way to
/// inject various failure modes into the system.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Message-level faults
    message_faults: Vec<MessageFault>,

    /// Resource faults
    resource_faults: Vec<ResourceFault>,
}

impl FaultPlan {
    /// Creates a new empty fault plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message fault to the plan
    pub fn with_message_fault(mut self, fault: MessageFault) -> Self {
        self.message_faults.push(fault);
        self
    }

    /// Adds a resource fault to the plan
    pub fn with_resource_fault(mut self, fault: ResourceFault) -> Self {
        self.resource_faults.push(fault);
        self
    }

    /// Returns a reference to the message faults
    pub fn message_faults(&self) -> &[MessageFault] {
        &self.message_faults
    }

    /// Returns a reference to the resource faults
    pub fn resource_faults(&self) -> &[ResourceFault] {
        &self.resource_faults
    }
}

/// Fault injector that applies a plan to kernel operations
///
/// This tracks how many of each counted fault remain and how many faults
/// have fired.
#[derive(Debug)]
pub struct FaultInjector {
    plan: FaultPlan,

    interrupt_next_count: usize,
    interrupt_on_channel: HashMap<ChannelId, usize>,
    drop_pulse_count: usize,
    exhaust_channels: bool,
    exhaust_connections: bool,

    sends_interrupted: usize,
    pulses_dropped: usize,
}

impl FaultInjector {
    /// Creates a new fault injector with the given plan
    pub fn new(plan: FaultPlan) -> Self {
        let mut injector = Self {
            plan: plan.clone(),
            interrupt_next_count: 0,
            interrupt_on_channel: HashMap::new(),
            drop_pulse_count: 0,
            exhaust_channels: false,
            exhaust_connections: false,
            sends_interrupted: 0,
            pulses_dropped: 0,
        };

        for fault in plan.message_faults() {
            match fault {
                MessageFault::InterruptNextSend { count } => {
                    injector.interrupt_next_count += *count;
                }
                MessageFault::InterruptNextSendOnChannel { channel, count } => {
                    *injector.interrupt_on_channel.entry(*channel).or_insert(0) += *count;
                }
                MessageFault::DropNextPulse { count } => {
                    injector.drop_pulse_count += *count;
                }
                MessageFault::DropPulseCode { .. } => {
                    // Handled per-pulse
                }
            }
        }

        for fault in plan.resource_faults() {
            match fault {
                ResourceFault::ExhaustChannels => injector.exhaust_channels = true,
                ResourceFault::ExhaustConnections => injector.exhaust_connections = true,
            }
        }

        injector
    }

    /// Checks if a send to `channel` should be interrupted
    pub fn should_interrupt_send(&mut self, channel: ChannelId) -> bool {
        if self.interrupt_next_count > 0 {
            self.interrupt_next_count -= 1;
            self.sends_interrupted += 1;
            return true;
        }

        if let Some(count) = self.interrupt_on_channel.get_mut(&channel) {
            if *count > 0 {
                *count -= 1;
                self.sends_interrupted += 1;
                return true;
            }
        }

        false
    }

    /// Checks if a pulse should be dropped
    pub fn should_drop_pulse(&mut self, pulse: &Pulse) -> bool {
        if self.drop_pulse_count > 0 {
            self.drop_pulse_count -= 1;
            self.pulses_dropped += 1;
            return true;
        }

        for fault in self.plan.message_faults() {
            if let MessageFault::DropPulseCode { code } = fault {
                if pulse.code == *code {
                    self.pulses_dropped += 1;
                    return true;
                }
            }
        }

        false
    }

    /// Checks if a channel creation should fail
    pub fn should_fail_channel_create(&self) -> bool {
        self.exhaust_channels
    }

    /// Checks if a connection attach should fail
    pub fn should_fail_connect(&self) -> bool {
        self.exhaust_connections
    }

    /// Returns the number of sends interrupted so far
    pub fn sends_interrupted(&self) -> usize {
        self.sends_interrupted
    }

    /// Returns the number of pulses dropped so far
    pub fn pulses_dropped(&self) -> usize {
        self.pulses_dropped
    }
}
