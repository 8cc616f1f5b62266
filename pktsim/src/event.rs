use crate::PacketId;

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

/// Type of an event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A packet arrives and asks to be admitted to the queue.
    Spawn,
    /// A processor finishes serving a packet.
    Done,
}

/// An event is something that happens to a packet at a given time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event's time.
    pub time: Duration,
    /// What happens.
    pub kind: EventKind,
    /// The packet it happens to.
    pub packet: PacketId,
}

impl Event {
    /// Constructs a new event.
    #[must_use]
    pub fn new(time: Duration, kind: EventKind, packet: PacketId) -> Self {
        Self { time, kind, packet }
    }

    /// Constructs an arrival event.
    #[must_use]
    pub fn spawn(time: Duration, packet: PacketId) -> Self {
        Self::new(time, EventKind::Spawn, packet)
    }

    /// Constructs a service completion event.
    #[must_use]
    pub fn done(time: Duration, packet: PacketId) -> Self {
        Self::new(time, EventKind::Done, packet)
    }
}

/// Entry stored in the heap: events with equal times are ordered by insertion.
#[derive(Debug)]
struct EventEntry {
    seq: u64,
    event: Event,
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventEntry {}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.event.time, self.seq).cmp(&(other.event.time, other.seq))
    }
}

/// Time-ordered set of future events.
///
/// Events are returned in the order of non-decreasing time. Events scheduled for the same time
/// are returned in the order they were inserted.
#[derive(Debug, Default)]
pub struct EventSet {
    events: BinaryHeap<Reverse<EventEntry>>,
    next_seq: u64,
}

impl EventSet {
    /// Schedules `event`.
    pub fn insert(&mut self, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Reverse(EventEntry { seq, event }));
    }

    /// Returns, and removes from the set, the next event to be processed.
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop().map(|Reverse(entry)| entry.event)
    }

    /// Returns the next event to be processed without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&Event> {
        self.events.peek().map(|Reverse(entry)| &entry.event)
    }

    /// Answers whether there are any events left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the number of scheduled events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Discards all scheduled events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Extend<Event> for EventSet {
    fn extend<T: IntoIterator<Item = Event>>(&mut self, iter: T) {
        for event in iter {
            self.insert(event);
        }
    }
}
