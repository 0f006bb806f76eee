//! Bounded receive queue for kernel channels.
//!
//! Provides deterministic FIFO ordering with explicit capacity limits. A
//! message entry only names its transaction; the bytes stay with the
//! blocked sender until a receiver copies them.

use core_types::ReceiveId;
use ipc::Pulse;
use std::collections::VecDeque;

/// Queue error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    Full,
}

/// One entry waiting on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEntry {
    /// A sender blocked on this receive id
    Message(ReceiveId),
    /// A pulse, delivered by value
    Pulse(Pulse),
}

/// Bounded FIFO queue for channel entries.
#[derive(Debug, Clone)]
pub struct MessageQueue {
    capacity: usize,
    entries: VecDeque<QueueEntry>,
}

impl MessageQueue {
    /// Creates a queue with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns remaining capacity.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.entries.len())
    }

    /// Pushes an entry onto the queue.
    pub fn push(&mut self, entry: QueueEntry) -> Result<(), QueueError> {
        if self.entries.len() >= self.capacity {
            return Err(QueueError::Full);
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// Pops the next entry.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Removes a queued message entry; returns whether it was present.
    pub fn remove_message(&mut self, rcvid: ReceiveId) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| *entry != QueueEntry::Message(rcvid));
        self.entries.len() != before
    }

    /// Drains every queued message entry, leaving pulses behind.
    pub fn drain_messages(&mut self) -> Vec<ReceiveId> {
        let mut drained = Vec::new();
        self.entries.retain(|entry| match entry {
            QueueEntry::Message(rcvid) => {
                drained.push(*rcvid);
                false
            }
            QueueEntry::Pulse(_) => true,
        });
        drained
    }
}
