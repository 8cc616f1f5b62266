use crate::{PacketId, Priority, ProcessorId};

use std::time::Duration;

use delegate::delegate;

/// The part of a packet that queues operate on.
///
/// Packets themselves stay in the scheduler for the entire run; queues only pass these handles
/// around, which carry everything needed to order the packets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PacketHandle {
    id: PacketId,
    priority: Priority,
    enter_time: Duration,
}

impl PacketHandle {
    /// Constructs a new handle.
    #[must_use]
    pub fn new(id: PacketId, priority: Priority, enter_time: Duration) -> Self {
        Self {
            id,
            priority,
            enter_time,
        }
    }

    /// The ID of the packet, unique throughout the entire simulation.
    #[must_use]
    pub fn id(&self) -> PacketId {
        self.id
    }

    /// The priority class of the packet.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// The time of the simulation when the packet arrived.
    #[must_use]
    pub fn enter_time(&self) -> Duration {
        self.enter_time
    }
}

/// Where a packet stands in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PacketState {
    /// Generated, but its arrival has not been processed yet.
    Pending,
    /// Admitted to the queue and waiting for a processor.
    Queued,
    /// Being served by a processor.
    Dispatched {
        /// When the processor picked the packet up.
        start: Duration,
        /// The processor serving the packet.
        processor: ProcessorId,
    },
    /// Service has finished.
    Completed {
        /// When the processor picked the packet up.
        start: Duration,
        /// The processor that served the packet.
        processor: ProcessorId,
    },
    /// Rejected at admission; it never entered the queue.
    Dropped,
}

/// Dispatch record of a packet that has been assigned to a processor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Dispatch {
    start: Duration,
    service_time: Duration,
    processor: ProcessorId,
}

impl Dispatch {
    /// The time of the simulation when service started.
    #[must_use]
    pub fn start_time(&self) -> Duration {
        self.start
    }

    /// The processor assigned to the packet.
    #[must_use]
    pub fn processor(&self) -> ProcessorId {
        self.processor
    }

    /// The time of the simulation when service finishes, saturating at [`Duration::MAX`].
    #[must_use]
    pub fn completion_time(&self) -> Duration {
        self.start.saturating_add(self.service_time)
    }
}

/// A single packet along with its arrival, service, and dispatch data.
///
/// The service time and priority are drawn once, when the packet is generated, and never change.
/// The state moves forward only: `Pending`, then either `Dropped`, or `Queued` followed by
/// `Dispatched` and `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    handle: PacketHandle,
    horizon: Duration,
    service_time: Duration,
    state: PacketState,
}

impl Packet {
    /// Constructs a packet that has not yet arrived.
    #[must_use]
    pub fn new(
        id: PacketId,
        horizon: Duration,
        enter_time: Duration,
        service_time: Duration,
        priority: Priority,
    ) -> Self {
        Self {
            handle: PacketHandle::new(id, priority, enter_time),
            horizon,
            service_time,
            state: PacketState::Pending,
        }
    }

    delegate! {
        to self.handle {
            /// The ID of the packet, unique throughout the entire simulation.
            #[must_use]
            pub fn id(&self) -> PacketId;
            /// The priority class of the packet.
            #[must_use]
            pub fn priority(&self) -> Priority;
            /// The time of the simulation when the packet arrived.
            #[must_use]
            pub fn enter_time(&self) -> Duration;
        }
    }

    /// The handle passed to queues.
    #[must_use]
    pub fn handle(&self) -> PacketHandle {
        self.handle
    }

    /// The time it takes a processor to serve this packet.
    #[must_use]
    pub fn service_time(&self) -> Duration {
        self.service_time
    }

    /// The end of the simulation this packet was generated for.
    #[must_use]
    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    /// The current state of the packet.
    #[must_use]
    pub fn state(&self) -> PacketState {
        self.state
    }

    /// Whether the packet was rejected at admission.
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.state == PacketState::Dropped
    }

    /// Whether the packet was admitted and is still waiting in the queue.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        self.state == PacketState::Queued
    }

    /// Whether the packet has been assigned to a processor, regardless of having finished.
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.dispatch().is_some()
    }

    /// Returns the dispatch record, or `None` if the packet has never been assigned to a
    /// processor.
    #[must_use]
    pub fn dispatch(&self) -> Option<Dispatch> {
        match self.state {
            PacketState::Dispatched { start, processor }
            | PacketState::Completed { start, processor } => Some(Dispatch {
                start,
                service_time: self.service_time,
                processor,
            }),
            _ => None,
        }
    }

    /// The time of the simulation when the packet is finished processing.
    ///
    /// # Panics
    ///
    /// Panics if the packet has not been dispatched yet. Use [`Packet::dispatch`] to check first.
    #[must_use]
    #[track_caller]
    pub fn completion_time(&self) -> Duration {
        self.dispatch()
            .map(|dispatch| dispatch.completion_time())
            .unwrap_or_else(|| panic!("packet is not started yet! (state: {:?})", self.state))
    }

    /// Time spent waiting for a processor: until the start of service if dispatched, or until
    /// the horizon otherwise.
    #[must_use]
    pub fn waiting_time(&self) -> Duration {
        let until = self
            .dispatch()
            .map_or(self.horizon, |dispatch| dispatch.start_time());
        until.saturating_sub(self.enter_time())
    }

    pub(crate) fn admit(&mut self) {
        assert_eq!(
            self.state,
            PacketState::Pending,
            "only a pending packet can be admitted"
        );
        self.state = PacketState::Queued;
    }

    pub(crate) fn reject(&mut self) {
        assert_eq!(
            self.state,
            PacketState::Pending,
            "only a pending packet can be dropped"
        );
        self.state = PacketState::Dropped;
    }

    pub(crate) fn start(&mut self, time: Duration, processor: ProcessorId) {
        assert_eq!(
            self.state,
            PacketState::Queued,
            "only a queued packet can be dispatched"
        );
        self.state = PacketState::Dispatched {
            start: time,
            processor,
        };
    }

    /// Returns the processor that has been serving the packet.
    pub(crate) fn finish(&mut self) -> ProcessorId {
        match self.state {
            PacketState::Dispatched { start, processor } => {
                self.state = PacketState::Completed { start, processor };
                processor
            }
            state => panic!("cannot finish a packet that is not in service: {:?}", state),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rstest::{fixture, rstest};

    #[fixture]
    fn packet() -> Packet {
        Packet::new(
            PacketId::from(3),
            Duration::from_secs(10),
            Duration::from_secs(2),
            Duration::from_millis(500),
            Priority::MEDIUM,
        )
    }

    #[rstest]
    fn test_lifecycle(mut packet: Packet) {
        assert_eq!(packet.state(), PacketState::Pending);
        packet.admit();
        assert!(packet.is_queued());
        assert!(!packet.has_started());
        packet.start(Duration::from_secs(3), ProcessorId::from(1));
        assert!(packet.has_started());
        assert_eq!(packet.completion_time(), Duration::from_millis(3500));
        assert_eq!(packet.finish(), ProcessorId::from(1));
        assert_eq!(
            packet.state(),
            PacketState::Completed {
                start: Duration::from_secs(3),
                processor: ProcessorId::from(1)
            }
        );
        let dispatch = packet.dispatch().unwrap();
        assert_eq!(dispatch.start_time(), Duration::from_secs(3));
        assert_eq!(dispatch.processor(), ProcessorId::from(1));
        assert_eq!(dispatch.completion_time(), Duration::from_millis(3500));
    }

    #[rstest]
    fn test_waiting_time(mut packet: Packet) {
        assert_eq!(packet.waiting_time(), Duration::from_secs(8));
        packet.admit();
        assert_eq!(packet.waiting_time(), Duration::from_secs(8));
        packet.start(Duration::from_millis(2250), ProcessorId::from(0));
        assert_eq!(packet.waiting_time(), Duration::from_millis(250));
    }

    #[rstest]
    fn test_dropped(mut packet: Packet) {
        packet.reject();
        assert!(packet.is_dropped());
        assert!(!packet.has_started());
        assert!(packet.dispatch().is_none());
    }

    #[rstest]
    fn test_handle(packet: Packet) {
        let handle = packet.handle();
        assert_eq!(handle.id(), PacketId::from(3));
        assert_eq!(handle.priority(), Priority::MEDIUM);
        assert_eq!(handle.enter_time(), Duration::from_secs(2));
    }

    mod contract_violations {
        use super::*;

        #[rstest]
        #[should_panic(expected = "packet is not started yet")]
        fn completion_time_of_queued(mut packet: Packet) {
            packet.admit();
            let _ = packet.completion_time();
        }

        #[rstest]
        #[should_panic(expected = "packet is not started yet")]
        fn completion_time_of_dropped(mut packet: Packet) {
            packet.reject();
            let _ = packet.completion_time();
        }

        #[rstest]
        #[should_panic]
        fn dispatch_dropped(mut packet: Packet) {
            packet.reject();
            packet.start(Duration::from_secs(3), ProcessorId::from(0));
        }

        #[rstest]
        #[should_panic]
        fn admit_twice(mut packet: Packet) {
            packet.admit();
            packet.admit();
        }
    }
}
