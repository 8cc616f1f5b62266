use super::{FifoQueue, PacketQueue};
use crate::{ConfigError, ObserverList, PacketHandle, QueueEvent, QueueObserver};

use std::fmt;
use std::rc::Weak;
use std::time::Duration;

use itertools::Itertools;

/// Weighted round robin over one FIFO queue per priority class.
///
/// Packets are admitted to the child of their class, so a packet is dropped only if its own
/// class is full. Dispatch serves up to `weights[i]` consecutive packets from child `i` before
/// moving on to the next child. A child found empty is skipped right away, and its unused quota
/// is forfeited.
///
/// The cursor starts at the highest class and moves towards lower classes, wrapping around.
#[derive(Debug)]
pub struct WrrQueue {
    queues: Vec<FifoQueue>,
    weights: Vec<usize>,
    current: usize,
    served: usize,
    observers: ObserverList,
}

impl WrrQueue {
    /// Creates a new weighted round robin queue, where `queues[i]` holds packets of priority `i`
    /// and is served `weights[i]` packets at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no children, if the number of weights differs from the
    /// number of children, or if any weight is zero.
    pub fn new(queues: Vec<FifoQueue>, weights: Vec<usize>) -> Result<Self, ConfigError> {
        if queues.is_empty() {
            return Err(ConfigError::NoSubqueues);
        }
        if queues.len() != weights.len() {
            return Err(ConfigError::WeightCountMismatch {
                queues: queues.len(),
                weights: weights.len(),
            });
        }
        if let Some(class) = weights.iter().position(|&w| w == 0) {
            return Err(ConfigError::ZeroWeight(class));
        }
        let current = queues.len() - 1;
        Ok(Self {
            queues,
            weights,
            current,
            served: 0,
            observers: ObserverList::default(),
        })
    }

    /// Dispatch weight of each class.
    #[must_use]
    pub fn weights(&self) -> &[usize] {
        &self.weights
    }

    fn advance(&mut self) {
        self.current = self
            .current
            .checked_sub(1)
            .unwrap_or(self.queues.len() - 1);
        self.served = 0;
    }
}

impl fmt::Display for WrrQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Weighted Round Robin Queue: Subqueues = [{}]",
            self.queues
                .iter()
                .zip(&self.weights)
                .format_with(", ", |(queue, weight), f| f(&format_args!(
                    "({}, w = {})",
                    queue, weight
                )))
        )
    }
}

impl PacketQueue for WrrQueue {
    fn add(&mut self, packet: PacketHandle, now: Duration) -> bool {
        let queue = match self.queues.get_mut(usize::from(packet.priority())) {
            Some(queue) => queue,
            None => {
                log::warn!(
                    "Packet {} of unknown priority class {} rejected",
                    packet.id(),
                    packet.priority()
                );
                return false;
            }
        };
        if !queue.add(packet, now) {
            return false;
        }
        self.observers.notify(&QueueEvent::Add {
            packet: &packet,
            current_time: now,
            new_length: self.len(),
        });
        true
    }

    fn pop(&mut self, now: Duration) -> Option<PacketHandle> {
        if self.is_empty() {
            return None;
        }
        let packet = loop {
            if let Some(packet) = self.queues[self.current].pop(now) {
                self.served += 1;
                if self.served >= self.weights[self.current] {
                    self.advance();
                }
                break packet;
            }
            self.advance();
        };
        self.observers.notify(&QueueEvent::Pop {
            current_time: now,
            new_length: self.len(),
        });
        Some(packet)
    }

    fn is_empty(&self) -> bool {
        self.queues.iter().all(FifoQueue::is_empty)
    }

    fn len(&self) -> usize {
        self.queues.iter().map(FifoQueue::len).sum()
    }

    fn register(&mut self, observers: Vec<Weak<dyn QueueObserver>>) {
        self.observers.register(observers);
    }

    fn leaf_subqueues(&self) -> Vec<&dyn PacketQueue> {
        self.queues
            .iter()
            .map(|queue| -> &dyn PacketQueue { queue })
            .collect()
    }

    fn leaf_subqueues_mut(&mut self) -> Vec<&mut dyn PacketQueue> {
        self.queues
            .iter_mut()
            .map(|queue| -> &mut dyn PacketQueue { queue })
            .collect()
    }

    fn num_classes(&self) -> Option<usize> {
        Some(self.queues.len())
    }
}
