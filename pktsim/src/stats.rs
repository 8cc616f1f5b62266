//! Statistics collected from a finished run.
//!
//! Queue-level metrics come from observers attached to every leaf queue before the run, see
//! [`Probes`]. Everything else is computed from the packets and processors left in the
//! [`Scheduler`] once it is done.

use crate::{
    weak_observer, Packet, PacketQueue, Priority, QueueHistoryObserver, QueueLengthObserver,
    Scheduler,
};

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

/// Number of bins of the waiting time distribution in a [`Report`].
pub const CDF_BINS: usize = 10;

/// Observers attached to a single leaf queue.
#[derive(Debug)]
pub struct LeafProbe {
    label: String,
    length: Rc<QueueLengthObserver>,
    history: Rc<QueueHistoryObserver>,
}

impl LeafProbe {
    /// Description of the observed queue.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queue length observer.
    #[must_use]
    pub fn length(&self) -> &QueueLengthObserver {
        &self.length
    }

    /// Queue history observer.
    #[must_use]
    pub fn history(&self) -> &QueueHistoryObserver {
        &self.history
    }
}

/// Owns the observers registered on the leaf queues of a discipline.
#[derive(Debug)]
pub struct Probes {
    leaves: Vec<LeafProbe>,
}

impl Probes {
    /// Registers a length and a history observer on each leaf of `queue`.
    pub fn attach(queue: &mut dyn PacketQueue) -> Self {
        let leaves = queue
            .leaf_subqueues_mut()
            .into_iter()
            .map(|leaf| {
                let length = Rc::new(QueueLengthObserver::default());
                let history = Rc::new(QueueHistoryObserver::default());
                leaf.register(vec![weak_observer(&length), weak_observer(&history)]);
                LeafProbe {
                    label: leaf.to_string(),
                    length,
                    history,
                }
            })
            .collect();
        Self { leaves }
    }

    /// Probes in the order of the leaf queues.
    #[must_use]
    pub fn leaves(&self) -> &[LeafProbe] {
        &self.leaves
    }
}

/// A metric measured on a single leaf queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueMetric<T> {
    /// Description of the queue.
    pub queue: String,
    /// Measured value.
    pub value: T,
}

/// A point of an empirical cumulative distribution function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CdfPoint {
    /// Right edge of the bin, in seconds.
    pub waiting_time: f64,
    /// Fraction of values up to this bin, inclusive.
    pub probability: f64,
}

/// Summary of a finished run. All times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Simulation horizon.
    pub horizon: f64,
    /// Long-run average length of each leaf queue.
    pub average_queue_lengths: Vec<QueueMetric<f64>>,
    /// Average waiting time of all admitted packets.
    pub average_waiting_time: Option<f64>,
    /// Average waiting time of packets admitted to each leaf queue.
    pub average_waiting_times: Vec<QueueMetric<Option<f64>>>,
    /// Fraction of the horizon each processor spent serving packets.
    pub utilization: Vec<f64>,
    /// Number of generated packets.
    pub generated: usize,
    /// Number of packets rejected at admission.
    pub dropped: usize,
    /// Number of packets assigned to a processor, whether finished or not.
    pub dispatched: usize,
    /// Number of packets left waiting in the queue at the horizon.
    pub queued: usize,
    /// Distribution of waiting times of admitted packets of the top priority class.
    pub top_priority_waiting_cdf: Vec<CdfPoint>,
}

impl Report {
    /// Computes the report of the run of `scheduler`, whose leaf queues have been observed by
    /// `probes` from the start.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(scheduler: &Scheduler, probes: &Probes) -> Self {
        let horizon = scheduler.config().horizon;
        let packets = scheduler.packets();
        let admitted = || packets.iter().filter(|p| !p.is_dropped());
        let top_priority = Priority::from(scheduler.config().num_classes().saturating_sub(1));
        let top_waiting = admitted()
            .filter(|p| p.priority() == top_priority)
            .map(|p| p.waiting_time().as_secs_f64())
            .collect_vec();
        Self {
            horizon: horizon.as_secs_f64(),
            average_queue_lengths: probes
                .leaves()
                .iter()
                .map(|probe| QueueMetric {
                    queue: probe.label.clone(),
                    value: probe.length.average_length(horizon),
                })
                .collect(),
            average_waiting_time: mean(admitted().map(|p| p.waiting_time().as_secs_f64())),
            average_waiting_times: probes
                .leaves()
                .iter()
                .map(|probe| QueueMetric {
                    queue: probe.label.clone(),
                    value: probe.history.average_waiting_time(packets),
                })
                .collect(),
            utilization: scheduler
                .processors()
                .iter()
                .map(|processor| {
                    processor.busy_time_until(horizon).as_secs_f64() / horizon.as_secs_f64()
                })
                .collect(),
            generated: packets.len(),
            dropped: packets.iter().filter(|p| p.is_dropped()).count(),
            dispatched: packets.iter().filter(|p| p.has_started()).count(),
            queued: packets.iter().filter(|p| p.is_queued()).count(),
            top_priority_waiting_cdf: empirical_cdf(&top_waiting, CDF_BINS),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (count, sum) = values.fold((0_usize, 0.0), |(count, sum), v| (count + 1, sum + v));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Empirical CDF over `bins` equal-width bins spanning the range of `values`.
///
/// If all values are equal, the range is widened by half a second on both sides.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn empirical_cdf(values: &[f64], bins: usize) -> Vec<CdfPoint> {
    let (low, high) = match values.iter().copied().minmax() {
        MinMaxResult::NoElements => return Vec::new(),
        MinMaxResult::OneElement(value) => (value - 0.5, value + 0.5),
        MinMaxResult::MinMax(min, max) if max > min => (min, max),
        MinMaxResult::MinMax(min, max) => (min - 0.5, max + 0.5),
    };
    if bins == 0 {
        return Vec::new();
    }
    let width = (high - low) / bins as f64;
    let mut counts = vec![0_usize; bins];
    for &value in values {
        let bin = (((value - low) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    let total = values.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .scan(0, |cumulative, (bin, count)| {
            *cumulative += count;
            Some(CdfPoint {
                waiting_time: low + width * (bin + 1) as f64,
                probability: *cumulative as f64 / total,
            })
        })
        .collect()
}

/// A flat, serializable record of a single packet, e.g., for CSV output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketRecord {
    /// Packet ID.
    pub id: usize,
    /// Priority class.
    pub priority: usize,
    /// Final state.
    pub state: String,
    /// Arrival time.
    pub enter_time: f64,
    /// Service time.
    pub service_time: f64,
    /// Start of service, if dispatched.
    pub start_time: Option<f64>,
    /// End of service, if dispatched.
    pub completion_time: Option<f64>,
    /// Serving processor, if dispatched.
    pub processor: Option<usize>,
    /// Waiting time, unless dropped.
    pub waiting_time: Option<f64>,
}

impl From<&Packet> for PacketRecord {
    fn from(packet: &Packet) -> Self {
        let dispatch = packet.dispatch();
        Self {
            id: packet.id().into(),
            priority: packet.priority().into(),
            state: packet.state().as_ref().to_string(),
            enter_time: packet.enter_time().as_secs_f64(),
            service_time: packet.service_time().as_secs_f64(),
            start_time: dispatch.map(|d| d.start_time().as_secs_f64()),
            completion_time: dispatch.map(|d| d.completion_time().as_secs_f64()),
            processor: dispatch.map(|d| d.processor().into()),
            waiting_time: if packet.is_dropped() {
                None
            } else {
                Some(packet.waiting_time().as_secs_f64())
            },
        }
    }
}

struct Seconds(Option<f64>);

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(secs) => write!(f, "{:?}", Duration::from_secs_f64(secs)),
            None => write!(f, "n/a"),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Long-run average queue lengths")?;
        for metric in &self.average_queue_lengths {
            writeln!(f, "\tL_Q for ({}): {:.4}", metric.queue, metric.value)?;
        }
        writeln!(
            f,
            "Average waiting time in all queues: {}",
            Seconds(self.average_waiting_time)
        )?;
        writeln!(f, "Average waiting time in each queue")?;
        for metric in &self.average_waiting_times {
            writeln!(f, "\tW_Q for ({}): {}", metric.queue, Seconds(metric.value))?;
        }
        writeln!(f, "Processor utilization")?;
        for (idx, rho) in self.utilization.iter().enumerate() {
            writeln!(f, "\tprocessor #{}: {:.4}", idx + 1, rho)?;
        }
        writeln!(
            f,
            "Packets: generated = {}, dropped = {}, dispatched = {}, still queued = {}",
            self.generated, self.dropped, self.dispatched, self.queued
        )?;
        writeln!(f, "CDF of top-priority waiting times")?;
        for point in &self.top_priority_waiting_cdf {
            writeln!(
                f,
                "\t<= {}: {:.4}",
                Seconds(Some(point.waiting_time.max(0.0))),
                point.probability
            )?;
        }
        Ok(())
    }
}
