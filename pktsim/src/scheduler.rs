use crate::config::Distributions;
use crate::{
    Arrival, ConfigError, Event, EventKind, EventSet, Packet, PacketGenerator, PacketId,
    PacketQueue, Processor, ProcessorId, SchedulerConfig,
};

use std::time::Duration;

use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::Exp;

/// Arrival stream of a scheduler's configuration.
pub type ConfiguredGenerator<R> = PacketGenerator<R, Exp<f64>, Exp<f64>, WeightedIndex<f64>>;

/// Drives the simulation: owns the queue, the event set, the processor pool, and every packet.
///
/// A run consists of scheduling the arrivals, see [`Scheduler::schedule_arrivals`], and then
/// processing the events batch by batch, see [`Scheduler::step`]. [`Scheduler::run`] does both.
/// Once finished, [`Scheduler::packets`] holds every generated packet, in the generation order,
/// with its final state.
pub struct Scheduler {
    config: SchedulerConfig,
    distributions: Distributions,
    queue: Box<dyn PacketQueue>,
    events: EventSet,
    processors: Vec<Processor>,
    packets: Vec<Packet>,
    clock: Duration,
}

impl Scheduler {
    /// Constructs a new scheduler serving `queue`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, or if `queue` distinguishes a different
    /// number of priority classes than configured.
    pub fn new(config: SchedulerConfig, queue: Box<dyn PacketQueue>) -> Result<Self, ConfigError> {
        let distributions = config.distributions()?;
        if let Some(classes) = queue.num_classes() {
            if classes != config.num_classes() {
                return Err(ConfigError::ClassCountMismatch {
                    queue: classes,
                    config: config.num_classes(),
                });
            }
        }
        let processors = vec![Processor::default(); config.processor_count];
        Ok(Self {
            config,
            distributions,
            queue,
            events: EventSet::default(),
            processors,
            packets: Vec::new(),
            clock: Duration::default(),
        })
    }

    /// Generates the arrivals of the whole run and processes events until the horizon is reached
    /// or no events are left.
    pub fn run<R: Rng>(&mut self, rng: R) {
        log::info!(
            "Starting simulation: {}, {} processor(s), horizon {:?}",
            self.queue,
            self.processors.len(),
            self.config.horizon
        );
        let arrivals = self.generator(rng);
        self.schedule_arrivals(arrivals);
        while self.step() {}
        log::info!(
            "Simulation finished at {:?}: {} packets generated",
            self.clock,
            self.packets.len()
        );
    }

    /// Arrival stream following the configured arrival rate, service time, and priority weights.
    pub fn generator<R: Rng>(&self, rng: R) -> ConfiguredGenerator<R> {
        let Distributions {
            interarrival,
            service,
            priority,
        } = self.distributions.clone();
        PacketGenerator::new(rng, interarrival, service, priority, self.config.horizon)
    }

    /// Creates a packet for each of `arrivals` and schedules its arrival.
    ///
    /// Packets are numbered in the order they are given. Arrivals at or after the horizon are
    /// ignored.
    pub fn schedule_arrivals<A>(&mut self, arrivals: A)
    where
        A: IntoIterator<Item = Arrival>,
    {
        let horizon = self.config.horizon;
        for arrival in arrivals
            .into_iter()
            .filter(|arrival| arrival.enter_time < horizon)
        {
            let id = PacketId::from(self.packets.len());
            self.packets.push(Packet::new(
                id,
                horizon,
                arrival.enter_time,
                arrival.service_time,
                arrival.priority,
            ));
            self.events.insert(Event::spawn(arrival.enter_time, id));
        }
        log::debug!("{} arrivals scheduled", self.packets.len());
    }

    /// Processes the next batch of events, all sharing the same time, and then assigns waiting
    /// packets to idle processors.
    ///
    /// Returns `false` once there is nothing left to do: either no events are left, or the next
    /// event is at or beyond the horizon, in which case all remaining events are discarded.
    pub fn step(&mut self) -> bool {
        let event = match self.events.pop() {
            Some(event) => event,
            None => return false,
        };
        if event.time >= self.config.horizon {
            log::debug!(
                "Reached horizon; discarding {} pending events",
                self.events.len() + 1
            );
            self.events.clear();
            return false;
        }
        self.clock = event.time;
        self.apply(event);
        while let Some(event) = self.next_in_batch() {
            self.apply(event);
        }
        self.fill_processors();
        true
    }

    fn next_in_batch(&mut self) -> Option<Event> {
        if self.events.peek()?.time == self.clock {
            self.events.pop()
        } else {
            None
        }
    }

    fn apply(&mut self, event: Event) {
        log::trace!(
            "[{:?}] {:?} of packet {}",
            event.time,
            event.kind,
            event.packet
        );
        let packet = &mut self.packets[usize::from(event.packet)];
        match event.kind {
            EventKind::Spawn => {
                if self.queue.add(packet.handle(), event.time) {
                    packet.admit();
                } else {
                    log::debug!("[{:?}] Packet {} dropped", event.time, event.packet);
                    packet.reject();
                }
            }
            EventKind::Done => {
                let processor = packet.finish();
                self.processors[usize::from(processor)].release(event.time);
            }
        }
    }

    fn fill_processors(&mut self) {
        for (idx, processor) in self.processors.iter_mut().enumerate() {
            if self.queue.is_empty() {
                break;
            }
            if processor.is_busy() {
                continue;
            }
            let handle = match self.queue.pop(self.clock) {
                Some(handle) => handle,
                None => break,
            };
            let packet = &mut self.packets[usize::from(handle.id())];
            packet.start(self.clock, ProcessorId::from(idx));
            let until = packet.completion_time();
            processor.dispatch(self.clock, until);
            self.events.insert(Event::done(until, handle.id()));
            log::debug!(
                "[{:?}] Packet {} dispatched to processor {}",
                self.clock,
                handle.id(),
                idx
            );
        }
    }

    /// Every packet generated so far, in the generation order.
    #[must_use]
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Consumes the scheduler and returns its packets.
    #[must_use]
    pub fn into_packets(self) -> Vec<Packet> {
        self.packets
    }

    /// The served queue.
    #[must_use]
    pub fn queue(&self) -> &dyn PacketQueue {
        self.queue.as_ref()
    }

    /// Mutable access to the served queue, e.g., to register observers before a run.
    pub fn queue_mut(&mut self) -> &mut dyn PacketQueue {
        self.queue.as_mut()
    }

    /// The processor pool.
    #[must_use]
    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    /// The configuration of this run.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The current simulation time: the time of the last processed batch.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.clock
    }

    /// The number of events waiting to be processed.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{FifoQueue, PacketState, Priority, QueueKind};

    use rstest::{fixture, rstest};

    fn config(processors: usize, classes: usize) -> SchedulerConfig {
        SchedulerConfig {
            arrival_rate: 1.0,
            mean_service_time: Duration::from_secs(1),
            horizon: Duration::from_secs(10),
            processor_count: processors,
            priority_weights: vec![1.0; classes],
        }
    }

    fn arrival(enter_ms: u64, service_ms: u64) -> Arrival {
        Arrival {
            enter_time: Duration::from_millis(enter_ms),
            service_time: Duration::from_millis(service_ms),
            priority: Priority::LOW,
        }
    }

    fn secs(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    fn started(scheduler: &Scheduler, id: usize) -> Option<(Duration, ProcessorId)> {
        scheduler.packets()[id]
            .dispatch()
            .map(|dispatch| (dispatch.start_time(), dispatch.processor()))
    }

    #[fixture]
    fn two_processors() -> Scheduler {
        Scheduler::new(config(2, 1), Box::new(FifoQueue::unbounded())).unwrap()
    }

    #[rstest]
    fn test_fill_in_processor_order(mut two_processors: Scheduler) {
        let scheduler = &mut two_processors;
        scheduler.schedule_arrivals(vec![
            arrival(1000, 5000),
            arrival(1000, 2000),
            arrival(1000, 1000),
        ]);
        assert!(scheduler.step());
        assert_eq!(scheduler.time(), secs(1));
        assert_eq!(started(scheduler, 0), Some((secs(1), ProcessorId::from(0))));
        assert_eq!(started(scheduler, 1), Some((secs(1), ProcessorId::from(1))));
        assert!(scheduler.packets()[2].is_queued());
        assert_eq!(scheduler.queue().len(), 1);

        assert!(scheduler.step());
        assert_eq!(scheduler.time(), secs(3));
        assert_eq!(
            scheduler.packets()[1].state(),
            PacketState::Completed {
                start: secs(1),
                processor: ProcessorId::from(1)
            }
        );
        assert_eq!(started(scheduler, 2), Some((secs(3), ProcessorId::from(1))));

        while scheduler.step() {}
        assert!(scheduler
            .packets()
            .iter()
            .all(|p| matches!(p.state(), PacketState::Completed { .. })));
        assert_eq!(scheduler.processors()[0].busy_time(), secs(5));
        assert_eq!(scheduler.processors()[1].busy_time(), secs(3));
    }

    #[test]
    fn test_batch_is_admitted_before_fill() {
        let mut scheduler =
            Scheduler::new(config(1, 1), Box::new(FifoQueue::new(1).unwrap())).unwrap();
        scheduler.schedule_arrivals(vec![
            arrival(1000, 1000),
            arrival(1000, 1000),
            arrival(1500, 1000),
        ]);
        assert!(scheduler.step());
        assert_eq!(started(&scheduler, 0), Some((secs(1), ProcessorId::from(0))));
        // The queue was full while the whole batch was being admitted.
        assert!(scheduler.packets()[1].is_dropped());

        assert!(scheduler.step());
        assert!(scheduler.packets()[2].is_queued());
        assert!(scheduler.step());
        assert_eq!(started(&scheduler, 2), Some((secs(2), ProcessorId::from(0))));
    }

    #[rstest]
    fn test_done_and_spawn_share_a_batch(mut two_processors: Scheduler) {
        let scheduler = &mut two_processors;
        scheduler.schedule_arrivals(vec![
            arrival(0, 1000),
            arrival(0, 5000),
            arrival(1000, 1000),
        ]);
        assert!(scheduler.step());
        assert!(scheduler.step());
        assert_eq!(scheduler.time(), secs(1));
        assert_eq!(started(scheduler, 2), Some((secs(1), ProcessorId::from(0))));
    }

    #[test]
    fn test_horizon_discards_pending_events() {
        let mut scheduler = Scheduler::new(config(1, 1), Box::new(FifoQueue::unbounded())).unwrap();
        scheduler.schedule_arrivals(vec![arrival(9000, 5000), arrival(9500, 100)]);
        assert!(scheduler.step());
        assert!(scheduler.step());
        assert_eq!(scheduler.pending_events(), 1);
        assert!(!scheduler.step());
        assert_eq!(scheduler.pending_events(), 0);
        assert!(matches!(
            scheduler.packets()[0].state(),
            PacketState::Dispatched { .. }
        ));
        assert!(scheduler.packets()[1].is_queued());
        assert_eq!(scheduler.packets()[1].waiting_time(), Duration::from_millis(500));
        assert_eq!(scheduler.processors()[0].busy_time(), Duration::default());
        assert_eq!(scheduler.processors()[0].busy_time_until(secs(10)), secs(1));
        assert!(!scheduler.step());
    }

    #[test]
    fn test_arrivals_past_horizon_are_ignored() {
        let mut scheduler = Scheduler::new(config(1, 1), Box::new(FifoQueue::unbounded())).unwrap();
        scheduler.schedule_arrivals(vec![arrival(9999, 1), arrival(10000, 1), arrival(20000, 1)]);
        assert_eq!(scheduler.packets().len(), 1);
        assert_eq!(scheduler.pending_events(), 1);
    }

    #[test]
    fn test_zero_service_time() {
        let mut scheduler = Scheduler::new(config(1, 1), Box::new(FifoQueue::unbounded())).unwrap();
        scheduler.schedule_arrivals(vec![arrival(1000, 0), arrival(1000, 0)]);
        while scheduler.step() {}
        assert!(scheduler
            .packets()
            .iter()
            .all(|p| p.completion_time() == secs(1)));
    }

    #[test]
    fn test_service_past_horizon() {
        let mut scheduler = Scheduler::new(config(2, 1), Box::new(FifoQueue::unbounded())).unwrap();
        scheduler.schedule_arrivals(vec![
            Arrival {
                service_time: Duration::MAX,
                ..arrival(1000, 0)
            },
            arrival(2000, 25000),
        ]);
        while scheduler.step() {}
        let packets = scheduler.packets();
        assert_eq!(packets[0].service_time(), Duration::MAX);
        assert_eq!(packets[0].completion_time(), Duration::MAX);
        assert_eq!(packets[1].service_time(), Duration::from_secs(25));
        assert_eq!(packets[1].completion_time(), Duration::from_secs(27));
        assert!(scheduler.processors().iter().all(Processor::is_busy));
    }

    #[test]
    fn test_empty_run() {
        let mut scheduler = Scheduler::new(config(3, 1), Box::new(FifoQueue::unbounded())).unwrap();
        assert!(!scheduler.step());
        assert!(scheduler.packets().is_empty());
        assert_eq!(scheduler.time(), Duration::default());
    }

    #[test]
    fn test_run_with_generated_arrivals() {
        use rand_chacha::{rand_core::SeedableRng, ChaChaRng};
        let mut scheduler = Scheduler::new(config(2, 1), Box::new(FifoQueue::unbounded())).unwrap();
        scheduler.run(ChaChaRng::seed_from_u64(7));
        assert!(!scheduler.packets().is_empty());
        assert!(scheduler.time() < secs(10));
        assert_eq!(scheduler.pending_events(), 0);
        assert!(scheduler.packets().iter().all(|p| !p.is_dropped()
            && p.enter_time() < secs(10)
            && p.state() != PacketState::Pending));
    }

    #[rstest]
    #[case(QueueKind::Wrr, 3, None)]
    #[case(QueueKind::Wrr, 2, Some(ConfigError::ClassCountMismatch { queue: 3, config: 2 }))]
    #[case(QueueKind::Fifo, 2, None)]
    #[case(QueueKind::Npps, 5, None)]
    fn test_class_count(
        #[case] kind: QueueKind,
        #[case] classes: usize,
        #[case] expected: Option<ConfigError>,
    ) {
        let queue = kind.build(10, &[1, 1, 1]).unwrap();
        assert_eq!(Scheduler::new(config(1, classes), queue).err(), expected);
    }

    #[test]
    fn test_invalid_config() {
        assert_eq!(
            Scheduler::new(config(0, 1), Box::new(FifoQueue::unbounded())).err(),
            Some(ConfigError::NoProcessors)
        );
    }
}
