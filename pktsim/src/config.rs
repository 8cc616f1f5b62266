use std::time::Duration;

use rand::distributions::WeightedIndex;
use rand_distr::Exp;

/// Rejected configuration of a simulation or a queue.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Arrival rate must be a positive, finite number of packets per second.
    #[error("invalid arrival rate: {0}")]
    InvalidArrivalRate(f64),
    /// Mean service time must be positive.
    #[error("mean service time must be positive")]
    ZeroServiceTime,
    /// The simulation must last for some time.
    #[error("simulation horizon must be positive")]
    ZeroHorizon,
    /// At least one processor is needed.
    #[error("at least one processor is required")]
    NoProcessors,
    /// Priority weights must be non-empty, non-negative, and sum up to a positive value.
    #[error("invalid priority weights: {0:?}")]
    InvalidPriorityWeights(Vec<f64>),
    /// A queue must be able to hold at least one packet.
    #[error("queue capacity must be positive")]
    ZeroCapacity,
    /// A composite queue needs at least one subqueue.
    #[error("weighted round robin queue needs at least one subqueue")]
    NoSubqueues,
    /// Each subqueue must have exactly one weight.
    #[error("{queues} subqueues but {weights} weights")]
    WeightCountMismatch {
        /// Number of subqueues.
        queues: usize,
        /// Number of weights.
        weights: usize,
    },
    /// A subqueue with zero weight would never be served.
    #[error("weight of subqueue {0} is zero")]
    ZeroWeight(usize),
    /// A class-aware queue must have exactly one subqueue per priority class.
    #[error("queue distinguishes {queue} priority classes but {config} are configured")]
    ClassCountMismatch {
        /// Number of classes distinguished by the queue.
        queue: usize,
        /// Number of configured priority classes.
        config: usize,
    },
}

/// Parameters of a single simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// The expected number of arrivals per second.
    pub arrival_rate: f64,
    /// The expected service time of a packet.
    pub mean_service_time: Duration,
    /// Simulated time at which the simulation stops.
    pub horizon: Duration,
    /// Number of processors serving the queue.
    pub processor_count: usize,
    /// Relative frequency of each priority class; its length is the number of classes.
    pub priority_weights: Vec<f64>,
}

/// Distributions of a validated configuration: inter-arrival gaps, service times, and
/// priority classes.
#[derive(Debug, Clone)]
pub(crate) struct Distributions {
    pub(crate) interarrival: Exp<f64>,
    pub(crate) service: Exp<f64>,
    pub(crate) priority: WeightedIndex<f64>,
}

impl SchedulerConfig {
    /// Checks that the configuration describes a valid simulation.
    ///
    /// # Errors
    ///
    /// Returns the first problem found. See [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.distributions().map(|_| ())
    }

    /// The number of priority classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.priority_weights.len()
    }

    pub(crate) fn distributions(&self) -> Result<Distributions, ConfigError> {
        if !(self.arrival_rate.is_finite() && self.arrival_rate > 0.0) {
            return Err(ConfigError::InvalidArrivalRate(self.arrival_rate));
        }
        if self.mean_service_time == Duration::default() {
            return Err(ConfigError::ZeroServiceTime);
        }
        if self.horizon == Duration::default() {
            return Err(ConfigError::ZeroHorizon);
        }
        if self.processor_count == 0 {
            return Err(ConfigError::NoProcessors);
        }
        let invalid_weights = || ConfigError::InvalidPriorityWeights(self.priority_weights.clone());
        if self.priority_weights.iter().any(|w| !w.is_finite()) {
            return Err(invalid_weights());
        }
        let priority = WeightedIndex::new(&self.priority_weights).map_err(|_| invalid_weights())?;
        let interarrival = Exp::new(self.arrival_rate)
            .map_err(|_| ConfigError::InvalidArrivalRate(self.arrival_rate))?;
        let service = Exp::new(1.0 / self.mean_service_time.as_secs_f64())
            .map_err(|_| ConfigError::ZeroServiceTime)?;
        Ok(Distributions {
            interarrival,
            service,
            priority,
        })
    }
}
