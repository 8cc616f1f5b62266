use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ProcessorState {
    Idle,
    Busy { since: Duration, until: Duration },
}

/// A single server of the processor pool.
///
/// A processor is either idle or busy serving exactly one packet. It keeps track of the total
/// time it has spent serving packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processor {
    state: ProcessorState,
    busy_time: Duration,
}

impl Default for Processor {
    fn default() -> Self {
        Self {
            state: ProcessorState::Idle,
            busy_time: Duration::default(),
        }
    }
}

impl Processor {
    /// Whether the processor is currently serving a packet.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self.state, ProcessorState::Busy { .. })
    }

    /// Marks the processor busy from `now` until `until`.
    ///
    /// # Panics
    ///
    /// Panics if the processor is already busy.
    pub fn dispatch(&mut self, now: Duration, until: Duration) {
        assert!(!self.is_busy(), "processor is already busy");
        self.state = ProcessorState::Busy { since: now, until };
    }

    /// Marks the processor idle and accumulates the time since it was dispatched.
    ///
    /// # Panics
    ///
    /// Panics if the processor is idle.
    pub fn release(&mut self, now: Duration) {
        match self.state {
            ProcessorState::Busy { since, .. } => {
                self.busy_time += now.saturating_sub(since);
                self.state = ProcessorState::Idle;
            }
            ProcessorState::Idle => panic!("cannot release an idle processor"),
        }
    }

    /// The time the current service started, or `None` if idle.
    #[must_use]
    pub fn busy_since(&self) -> Option<Duration> {
        match self.state {
            ProcessorState::Busy { since, .. } => Some(since),
            ProcessorState::Idle => None,
        }
    }

    /// The time the current service is scheduled to end, or `None` if idle.
    #[must_use]
    pub fn busy_until(&self) -> Option<Duration> {
        match self.state {
            ProcessorState::Busy { until, .. } => Some(until),
            ProcessorState::Idle => None,
        }
    }

    /// Total time spent serving packets that have been released.
    #[must_use]
    pub fn busy_time(&self) -> Duration {
        self.busy_time
    }

    /// Total time spent serving packets up until `horizon`, including the service in progress.
    #[must_use]
    pub fn busy_time_until(&self, horizon: Duration) -> Duration {
        self.busy_time
            + self
                .busy_since()
                .map_or_else(Duration::default, |since| horizon.saturating_sub(since))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_busy_time() {
        let mut processor = Processor::default();
        assert!(!processor.is_busy());
        processor.dispatch(Duration::from_secs(1), Duration::from_secs(3));
        assert!(processor.is_busy());
        assert_eq!(processor.busy_since(), Some(Duration::from_secs(1)));
        assert_eq!(processor.busy_until(), Some(Duration::from_secs(3)));
        processor.release(Duration::from_secs(3));
        assert!(!processor.is_busy());
        processor.dispatch(Duration::from_secs(5), Duration::from_secs(6));
        processor.release(Duration::from_secs(6));
        assert_eq!(processor.busy_time(), Duration::from_secs(3));
        assert_eq!(processor.busy_until(), None);
    }

    #[test]
    fn test_busy_time_until_horizon() {
        let mut processor = Processor::default();
        assert_eq!(
            processor.busy_time_until(Duration::from_secs(10)),
            Duration::default()
        );
        processor.dispatch(Duration::from_secs(2), Duration::from_secs(4));
        processor.release(Duration::from_secs(4));
        processor.dispatch(Duration::from_secs(8), Duration::from_secs(15));
        assert_eq!(
            processor.busy_time_until(Duration::from_secs(10)),
            Duration::from_secs(4)
        );
        assert_eq!(processor.busy_time(), Duration::from_secs(2));
    }

    #[test]
    #[should_panic(expected = "processor is already busy")]
    fn test_dispatch_busy() {
        let mut processor = Processor::default();
        processor.dispatch(Duration::from_secs(1), Duration::from_secs(2));
        processor.dispatch(Duration::from_secs(1), Duration::from_secs(2));
    }

    #[test]
    #[should_panic(expected = "cannot release an idle processor")]
    fn test_release_idle() {
        Processor::default().release(Duration::from_secs(1));
    }
}
