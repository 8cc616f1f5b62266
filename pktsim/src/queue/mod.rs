//! Queueing disciplines.
//!
//! All disciplines implement [`PacketQueue`]. [`FifoQueue`] and [`NppsQueue`] are leaves;
//! [`WrrQueue`] is a composite that owns one [`FifoQueue`] per priority class.

use crate::{ConfigError, PacketHandle, QueueObserver};

use std::fmt;
use std::rc::Weak;
use std::time::Duration;

mod fifo;
mod npps;
mod wrr;

pub use fifo::FifoQueue;
pub use npps::NppsQueue;
pub use wrr::WrrQueue;

/// Implementors hold the packets waiting for a processor and decide which goes next.
///
/// A queue has no knowledge of processors; it only decides admission and dispatch order.
pub trait PacketQueue: fmt::Display {
    /// Attempts to admit `packet` at time `now`. Returns `false` if the packet was rejected, in
    /// which case the queue is left unchanged and no observer is notified.
    #[must_use]
    fn add(&mut self, packet: PacketHandle, now: Duration) -> bool;

    /// Removes and returns the next packet to be served, or `None` if the queue is empty.
    fn pop(&mut self, now: Duration) -> Option<PacketHandle>;

    /// Whether there are no waiting packets.
    fn is_empty(&self) -> bool;

    /// Number of waiting packets.
    fn len(&self) -> usize;

    /// Appends `observers` to this queue's observer list.
    ///
    /// For a composite discipline, this registers observers on the composite itself; to observe
    /// the individual classes, register on each of [`PacketQueue::leaf_subqueues_mut`].
    fn register(&mut self, observers: Vec<Weak<dyn QueueObserver>>);

    /// Leaf queues of this discipline. Returns only itself for a non-composite queue.
    fn leaf_subqueues(&self) -> Vec<&dyn PacketQueue>;

    /// Mutable access to the leaf queues, e.g., to register observers.
    fn leaf_subqueues_mut(&mut self) -> Vec<&mut dyn PacketQueue>;

    /// The number of priority classes the discipline distinguishes, or `None` if it accepts
    /// packets of any class.
    fn num_classes(&self) -> Option<usize> {
        None
    }
}

/// Type of queueing discipline.
#[derive(Debug, PartialEq, Eq, Clone, Copy, strum::EnumString, strum::ToString)]
#[strum(serialize_all = "snake_case")]
pub enum QueueKind {
    /// First in, first out. See [`FifoQueue`].
    Fifo,

    /// Weighted round robin across priority classes. See [`WrrQueue`].
    Wrr,

    /// Non-preemptive priority scheduling. See [`NppsQueue`].
    Npps,
}

impl QueueKind {
    /// Builds a queue of this kind.
    ///
    /// `capacity` limits every leaf queue. `weights` are only used by [`QueueKind::Wrr`], which
    /// creates one child per weight.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is zero, or if the weights are invalid for a weighted
    /// round robin queue.
    pub fn build(
        self,
        capacity: usize,
        weights: &[usize],
    ) -> Result<Box<dyn PacketQueue>, ConfigError> {
        Ok(match self {
            Self::Fifo => Box::new(FifoQueue::new(capacity)?),
            Self::Npps => Box::new(NppsQueue::new(capacity)?),
            Self::Wrr => {
                let children = weights
                    .iter()
                    .map(|_| FifoQueue::new(capacity))
                    .collect::<Result<Vec<_>, _>>()?;
                Box::new(WrrQueue::new(children, weights.to_vec())?)
            }
        })
    }
}
