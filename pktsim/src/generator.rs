use crate::Priority;

use std::time::Duration;

use rand::Rng;
use rand_distr::Distribution;

/// A generated arrival: when a packet enters, how long it takes to serve, and its class.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Arrival {
    /// Time of the arrival.
    pub enter_time: Duration,
    /// Time needed to serve the packet.
    pub service_time: Duration,
    /// Priority class of the packet.
    pub priority: Priority,
}

/// Generates the arrival stream of a single run.
///
/// Starting at time zero, each arrival happens after a gap drawn from the interarrival
/// distribution. The stream ends with the first arrival that would happen at or after the
/// horizon; that arrival is not produced. For each produced arrival, the priority class and then
/// the service time are drawn, in this order.
///
/// Distributions produce seconds. Negative and NaN samples are clamped to zero. Service times
/// are otherwise kept as drawn, even past the horizon; a sample too large for a [`Duration`]
/// becomes [`Duration::MAX`].
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// # use pktsim::{PacketGenerator, Priority};
/// # use rand::distributions::Uniform;
/// # use rand_chacha::{rand_core::SeedableRng, ChaChaRng};
/// let arrivals: Vec<_> = PacketGenerator::new(
///     ChaChaRng::seed_from_u64(0),
///     Uniform::new(0.5, 1.0),
///     Uniform::new(0.1, 0.2),
///     Uniform::new(0_usize, 3),
///     Duration::from_secs(10),
/// )
/// .collect();
/// assert!(arrivals.len() >= 10);
/// assert!(arrivals.windows(2).all(|w| w[0].enter_time < w[1].enter_time));
/// assert!(arrivals.iter().all(|a| a.priority <= Priority::HIGH));
/// ```
pub struct PacketGenerator<R, A, S, P>
where
    R: Rng,
    A: Distribution<f64>,
    S: Distribution<f64>,
    P: Distribution<usize>,
{
    rng: R,
    interarrival: A,
    service: S,
    priority: P,
    horizon: Duration,
    time: Duration,
    finished: bool,
}

impl<R, A, S, P> PacketGenerator<R, A, S, P>
where
    R: Rng,
    A: Distribution<f64>,
    S: Distribution<f64>,
    P: Distribution<usize>,
{
    /// Creates a new generator of arrivals before `horizon`.
    pub fn new(rng: R, interarrival: A, service: S, priority: P, horizon: Duration) -> Self {
        Self {
            rng,
            interarrival,
            service,
            priority,
            horizon,
            time: Duration::default(),
            finished: false,
        }
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    match secs.partial_cmp(&0_f64) {
        None | Some(std::cmp::Ordering::Less) => Duration::default(),
        _ => Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX),
    }
}

impl<R, A, S, P> Iterator for PacketGenerator<R, A, S, P>
where
    R: Rng,
    A: Distribution<f64>,
    S: Distribution<f64>,
    P: Distribution<usize>,
{
    type Item = Arrival;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let gap = secs_to_duration(self.interarrival.sample(&mut self.rng));
        self.time = self.time.saturating_add(gap);
        if self.time >= self.horizon {
            self.finished = true;
            return None;
        }
        let priority = Priority::from(self.priority.sample(&mut self.rng));
        let service_time = secs_to_duration(self.service.sample(&mut self.rng));
        Some(Arrival {
            enter_time: self.time,
            service_time,
            priority,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rand::rngs::mock::StepRng;
    use testing::{Constant, Sequence};

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_secs).collect()
    }

    #[test]
    fn test_horizon_is_exclusive() {
        let arrivals: Vec<_> = PacketGenerator::new(
            StepRng::new(0, 1),
            Constant::new(1.0),
            Constant::new(0.5),
            Constant::new(0_usize),
            Duration::from_secs(10),
        )
        .collect();
        assert_eq!(
            arrivals.iter().map(|a| a.enter_time).collect::<Vec<_>>(),
            secs(&[1, 2, 3, 4, 5, 6, 7, 8, 9])
        );
        assert!(arrivals
            .iter()
            .all(|a| a.service_time == Duration::from_millis(500) && a.priority == Priority::LOW));
    }

    #[test]
    fn test_draws() {
        let arrivals: Vec<_> = PacketGenerator::new(
            StepRng::new(0, 1),
            Sequence::new(vec![0.5, 1.5]),
            Sequence::new(vec![1.0, 2.0, 3.0]),
            Sequence::new(vec![2_usize, 0]),
            Duration::from_secs(5),
        )
        .collect();
        assert_eq!(
            arrivals,
            vec![
                Arrival {
                    enter_time: Duration::from_millis(500),
                    service_time: Duration::from_secs(1),
                    priority: Priority::HIGH,
                },
                Arrival {
                    enter_time: Duration::from_secs(2),
                    service_time: Duration::from_secs(2),
                    priority: Priority::LOW,
                },
                Arrival {
                    enter_time: Duration::from_millis(2500),
                    service_time: Duration::from_secs(3),
                    priority: Priority::HIGH,
                },
                Arrival {
                    enter_time: Duration::from_secs(4),
                    service_time: Duration::from_secs(1),
                    priority: Priority::LOW,
                },
                Arrival {
                    enter_time: Duration::from_millis(4500),
                    service_time: Duration::from_secs(2),
                    priority: Priority::HIGH,
                },
            ]
        );
    }

    #[test]
    fn test_clamped_samples() {
        let mut generator = PacketGenerator::new(
            StepRng::new(0, 1),
            Sequence::new(vec![-1.0, f64::NAN, 2.0]),
            Sequence::new(vec![-3.0, 100.0, 1.0]),
            Constant::new(1_usize),
            Duration::from_secs(10),
        );
        let first = generator.next().unwrap();
        assert_eq!(first.enter_time, Duration::default());
        assert_eq!(first.service_time, Duration::default());
        let second = generator.next().unwrap();
        assert_eq!(second.enter_time, Duration::default());
        assert_eq!(second.service_time, Duration::from_secs(100));
        assert_eq!(generator.next().unwrap().enter_time, Duration::from_secs(2));
    }

    #[test]
    fn test_service_time_past_horizon_is_kept() {
        let arrivals: Vec<_> = PacketGenerator::new(
            StepRng::new(0, 1),
            Constant::new(4.0),
            Sequence::new(vec![12.5, f64::INFINITY]),
            Constant::new(0_usize),
            Duration::from_secs(10),
        )
        .collect();
        assert_eq!(
            arrivals
                .iter()
                .map(|a| (a.enter_time, a.service_time))
                .collect::<Vec<_>>(),
            vec![
                (Duration::from_secs(4), Duration::from_millis(12500)),
                (Duration::from_secs(8), Duration::MAX),
            ]
        );
    }

    #[test]
    fn test_first_gap_beyond_horizon() {
        let mut generator = PacketGenerator::new(
            StepRng::new(0, 1),
            Constant::new(f64::INFINITY),
            Constant::new(1.0),
            Constant::new(0_usize),
            Duration::from_secs(1),
        );
        assert!(generator.next().is_none());
        assert!(generator.next().is_none());
    }
}
