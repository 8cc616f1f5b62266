//! Instrumentation hook exposed by queues.
//!
//! Every queue keeps an [`ObserverList`] and notifies it, synchronously and in registration
//! order, right after an admission or a removal has been committed. Rejected admissions and pops
//! on an empty queue are never reported. Queues hold only weak references to their observers,
//! so whoever registers an observer stays its owner.

use crate::{Packet, PacketHandle, PacketId};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Type of a queue observation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, strum::ToString)]
#[strum(serialize_all = "snake_case")]
pub enum ObservationKind {
    /// A packet was admitted to the queue.
    Add,
    /// A packet was removed from the queue.
    Pop,
}

/// A committed change of a queue, as reported to its observers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QueueEvent<'a> {
    /// A packet was admitted.
    Add {
        /// The admitted packet.
        packet: &'a PacketHandle,
        /// Simulation time of the admission.
        current_time: Duration,
        /// Queue length after the admission.
        new_length: usize,
    },
    /// A packet was removed.
    Pop {
        /// Simulation time of the removal.
        current_time: Duration,
        /// Queue length after the removal.
        new_length: usize,
    },
}

impl<'a> QueueEvent<'a> {
    /// Type of the observation.
    #[must_use]
    pub fn kind(&self) -> ObservationKind {
        match self {
            Self::Add { .. } => ObservationKind::Add,
            Self::Pop { .. } => ObservationKind::Pop,
        }
    }

    /// Simulation time of the change.
    #[must_use]
    pub fn current_time(&self) -> Duration {
        match self {
            Self::Add { current_time, .. } | Self::Pop { current_time, .. } => *current_time,
        }
    }

    /// Queue length after the change.
    #[must_use]
    pub fn new_length(&self) -> usize {
        match self {
            Self::Add { new_length, .. } | Self::Pop { new_length, .. } => *new_length,
        }
    }

    /// The admitted packet, or `None` for a removal.
    #[must_use]
    pub fn packet(&self) -> Option<&'a PacketHandle> {
        match self {
            Self::Add { packet, .. } => Some(*packet),
            Self::Pop { .. } => None,
        }
    }
}

/// Implementors receive notifications about committed queue changes.
///
/// Observers cannot influence the queue: the notification has no return value and the queue
/// state is final by the time it is sent. Observers that need to record anything use interior
/// mutability.
pub trait QueueObserver {
    /// Called after a successful admission or removal.
    fn notify(&self, event: &QueueEvent<'_>);
}

/// Downgrades a shared observer to the weak reference accepted by queues.
#[must_use]
pub fn weak_observer<O: QueueObserver + 'static>(observer: &Rc<O>) -> Weak<dyn QueueObserver> {
    let weak: Weak<O> = Rc::downgrade(observer);
    weak
}

/// Ordered list of observers registered on a single queue.
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<Weak<dyn QueueObserver>>,
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ObserverList {
    /// Appends `observers` to the list, preserving their order.
    pub fn register<I>(&mut self, observers: I)
    where
        I: IntoIterator<Item = Weak<dyn QueueObserver>>,
    {
        self.observers.extend(observers);
    }

    /// Number of registered observers, including ones that have been dropped since.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observers were registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Notifies all observers that are still alive, in the registration order.
    pub fn notify(&self, event: &QueueEvent<'_>) {
        for observer in self.observers.iter().filter_map(Weak::upgrade) {
            observer.notify(event);
        }
    }
}

#[derive(Debug, Default)]
struct LengthTimeline {
    time_at_length: BTreeMap<usize, Duration>,
    previous_update: Duration,
    length: usize,
}

/// Measures how long a queue spends at each length.
#[derive(Debug, Default)]
pub struct QueueLengthObserver {
    timeline: RefCell<LengthTimeline>,
}

impl QueueLengthObserver {
    /// Total time spent at each length observed so far, not counting the time since the last
    /// observed change.
    #[must_use]
    pub fn time_at_length(&self) -> BTreeMap<usize, Duration> {
        self.timeline.borrow().time_at_length.clone()
    }

    /// Integral of the queue length over time, in packet-seconds, up until `until`.
    ///
    /// The interval between the last observed change and `until` is attributed to the current
    /// length.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn time_weighted_length(&self, until: Duration) -> f64 {
        let timeline = self.timeline.borrow();
        let tail = until.saturating_sub(timeline.previous_update).as_secs_f64();
        timeline
            .time_at_length
            .iter()
            .map(|(&length, time)| length as f64 * time.as_secs_f64())
            .sum::<f64>()
            + timeline.length as f64 * tail
    }

    /// Long-run average length over the interval from zero to `horizon`.
    #[must_use]
    pub fn average_length(&self, horizon: Duration) -> f64 {
        if horizon == Duration::default() {
            0.0
        } else {
            self.time_weighted_length(horizon) / horizon.as_secs_f64()
        }
    }
}

impl QueueObserver for QueueLengthObserver {
    fn notify(&self, event: &QueueEvent<'_>) {
        let mut timeline = self.timeline.borrow_mut();
        let previous_length = match event.kind() {
            ObservationKind::Add => event.new_length().saturating_sub(1),
            ObservationKind::Pop => event.new_length() + 1,
        };
        let elapsed = event
            .current_time()
            .saturating_sub(timeline.previous_update);
        *timeline
            .time_at_length
            .entry(previous_length)
            .or_default() += elapsed;
        timeline.previous_update = event.current_time();
        timeline.length = event.new_length();
    }
}

/// Records every packet admitted to a queue.
#[derive(Debug, Default)]
pub struct QueueHistoryObserver {
    admitted: RefCell<Vec<PacketId>>,
}

impl QueueHistoryObserver {
    /// IDs of admitted packets, in the order of admission.
    #[must_use]
    pub fn admitted(&self) -> Vec<PacketId> {
        self.admitted.borrow().clone()
    }

    /// Number of admitted packets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.admitted.borrow().len()
    }

    /// Whether no packets have been admitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.admitted.borrow().is_empty()
    }

    /// Average waiting time, in seconds, of the admitted packets, looked up in `packets` by ID.
    /// IDs missing from `packets` are skipped. Returns `None` if none of the admitted packets
    /// are found.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_waiting_time(&self, packets: &[Packet]) -> Option<f64> {
        let (count, total) = self
            .admitted
            .borrow()
            .iter()
            .filter_map(|&id| packets.get(usize::from(id)))
            .fold((0_usize, 0.0), |(count, total), packet| {
                (count + 1, total + packet.waiting_time().as_secs_f64())
            });
        if count == 0 {
            None
        } else {
            Some(total / count as f64)
        }
    }
}

impl QueueObserver for QueueHistoryObserver {
    fn notify(&self, event: &QueueEvent<'_>) {
        if let Some(packet) = event.packet() {
            self.admitted.borrow_mut().push(packet.id());
        }
    }
}
