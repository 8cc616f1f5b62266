use super::PacketQueue;
use crate::{ConfigError, ObserverList, PacketHandle, QueueEvent, QueueObserver};

use std::collections::VecDeque;
use std::fmt;
use std::rc::Weak;
use std::time::Duration;

/// First in, first out queue with tail drop.
///
/// A packet is admitted only if the queue holds fewer than `capacity` packets.
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// # use pktsim::{FifoQueue, PacketHandle, PacketId, PacketQueue, Priority};
/// let packet = |id: usize| PacketHandle::new(PacketId::from(id), Priority::LOW, Duration::default());
/// let mut queue = FifoQueue::new(2).unwrap();
/// assert!(queue.add(packet(0), Duration::default()));
/// assert!(queue.add(packet(1), Duration::default()));
/// assert!(!queue.add(packet(2), Duration::default()));
/// assert_eq!(queue.pop(Duration::default()), Some(packet(0)));
/// ```
#[derive(Debug)]
pub struct FifoQueue {
    packets: VecDeque<PacketHandle>,
    capacity: usize,
    observers: ObserverList,
}

impl FifoQueue {
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

    /// Creates a queue that never drops packets in practice.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            packets: VecDeque::new(),
            capacity: usize::MAX,
            observers: ObserverList::default(),
        }
    }

    /// The maximum number of waiting packets.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Display for FifoQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FIFO Queue: Size = {}", self.capacity)
    }
}

impl PacketQueue for FifoQueue {
    fn add(&mut self, packet: PacketHandle, now: Duration) -> bool {
        if self.packets.len() >= self.capacity {
            return false;
        }
        self.packets.push_back(packet);
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::queue::test::{drain, ids, packet, recorder};
    use crate::ObservationKind::{Add, Pop};

    use quickcheck_macros::quickcheck;

    #[test]
    fn test_fifo_order() {
        let mut queue = FifoQueue::new(10).unwrap();
        for id in 0..5 {
            assert!(queue.add(packet(id, 4 - id), Duration::default()));
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(ids(&drain(&mut queue)), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fresh_queue() {
        let mut queue = FifoQueue::new(1).unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(queue.pop(Duration::default()).is_none());
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.to_string(), "FIFO Queue: Size = 1");
        assert_eq!(queue.leaf_subqueues().len(), 1);
    }

    #[test]
    fn test_unbounded() {
        let mut queue = FifoQueue::unbounded();
        for id in 0..1000 {
            assert!(queue.add(packet(id, 0), Duration::default()));
        }
        assert_eq!(queue.len(), 1000);
    }

    #[test]
    fn test_admission_frees_up_after_pop() {
        let mut queue = FifoQueue::new(1).unwrap();
        assert!(queue.add(packet(0, 0), Duration::default()));
        assert!(!queue.add(packet(1, 0), Duration::default()));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(Duration::default()), Some(packet(0, 0)));
        assert!(queue.add(packet(2, 0), Duration::default()));
    }

    #[test]
    fn test_notifications() {
        let mut queue = FifoQueue::new(3).unwrap();
        let recorder = recorder(&mut queue);
        for id in 0..5 {
            let _ = queue.add(packet(id, 0), Duration::default());
        }
        let _ = queue.pop(Duration::default());
        let _ = queue.pop(Duration::default());
        assert!(queue.add(packet(5, 0), Duration::default()));
        assert_eq!(
            *recorder.events.borrow(),
            vec![(Add, 1), (Add, 2), (Add, 3), (Pop, 2), (Pop, 1), (Add, 2)]
        );
    }

    #[quickcheck]
    fn pops_in_admission_order(priorities: Vec<u8>, capacity: u8) -> bool {
        let capacity = usize::from(capacity) + 1;
        let mut queue = FifoQueue::new(capacity).unwrap();
        let admitted: Vec<_> = priorities
            .iter()
            .enumerate()
            .map(|(id, &p)| packet(id, usize::from(p)))
            .filter(|&p| queue.add(p, Duration::default()))
            .collect();
        admitted.len() == priorities.len().min(capacity) && drain(&mut queue) == admitted
    }
}
