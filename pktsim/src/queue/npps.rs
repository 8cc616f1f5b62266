use super::PacketQueue;
use crate::{ConfigError, ObserverList, PacketHandle, QueueEvent, QueueObserver};

use std::collections::VecDeque;
use std::fmt;
use std::rc::Weak;
use std::time::Duration;

/// Non-preemptive priority scheduling queue.
///
/// Waiting packets are kept sorted by descending priority, and in arrival order within the same
/// priority. A full queue rejects any new packet, even one of higher priority than those already
/// waiting: nothing is ever evicted.
#[derive(Debug)]
pub struct NppsQueue {
    packets: VecDeque<PacketHandle>,
    capacity: usize,
    observers: ObserverList,
}

impl NppsQueue {
    /// Creates a queue with the given capacity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            packets: VecDeque::new(),
            capacity,
            observers: ObserverList::default(),
        })
    }

    /// The maximum number of waiting packets.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Display for NppsQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Non-preemptive Priority Scheduling Queue: Size = {}",
            self.capacity
        )
    }
}

impl PacketQueue for NppsQueue {
    fn add(&mut self, packet: PacketHandle, now: Duration) -> bool {
        if self.packets.len() >= self.capacity {
            return false;
        }
        self.packets.push_back(packet);
        // Moves only past strictly lower priorities, which keeps ties in arrival order.
        let mut idx = self.packets.len() - 1;
        while idx > 0 && self.packets[idx - 1].priority() < self.packets[idx].priority() {
            self.packets.swap(idx - 1, idx);
            idx -= 1;
        }
        self.observers.notify(&QueueEvent::Add {
            packet: &packet,
            current_time: now,
            new_length: self.packets.len(),
        });
        true
    }

    fn pop(&mut self, now: Duration) -> Option<PacketHandle> {
        let packet = self.packets.pop_front()?;
        self.observers.notify(&QueueEvent::Pop {
            current_time: now,
            new_length: self.packets.len(),
        });
        Some(packet)
    }

    fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    fn len(&self) -> usize {
        self.packets.len()
    }

    fn register(&mut self, observers: Vec<Weak<dyn QueueObserver>>) {
        self.observers.register(observers);
    }

    fn leaf_subqueues(&self) -> Vec<&dyn PacketQueue> {
        vec![self]
    }

    fn leaf_subqueues_mut(&mut self) -> Vec<&mut dyn PacketQueue> {
        vec![self]
    }
}
