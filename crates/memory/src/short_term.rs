//! Bounded short-term memory buffer.

use blockmind_core::ShortTermEvent;
use std::collections::VecDeque;

/// Default number of events kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 20;

/// A fixed-capacity FIFO of recent events. Pushing onto a full buffer
/// evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct ShortTermMemory {
    events: VecDeque<ShortTermEvent>,
    capacity: usize,
}

impl Default for ShortTermMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ShortTermMemory {
    /// Creates an empty buffer. A zero capacity is bumped to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event, returning the evicted one if the buffer was full.
    pub fn push(&mut self, event: ShortTermEvent) -> Option<ShortTermEvent> {
        let evicted = if self.events.len() == self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// The newest `n` events, oldest first. `n` is clamped to the length.
    pub fn recent(&self, n: usize) -> Vec<ShortTermEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &ShortTermEvent> {
        self.events.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
