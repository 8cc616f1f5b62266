//! Packet queueing simulation.
//!
//! Packets arrive at a single queue according to a Poisson process, wait there under the chosen
//! queueing discipline, and are served by a pool of identical processors with exponentially
//! distributed service times. The whole run is driven by a discrete-event loop over a
//! time-ordered [`EventSet`], so a run is fully determined by its configuration and the random
//! number stream.
//!
//! # Examples
//!
//! ```
//! # use std::time::Duration;
//! # use pktsim::{FifoQueue, Scheduler, SchedulerConfig};
//! # use rand_chacha::{rand_core::SeedableRng, ChaChaRng};
//! # fn main() -> Result<(), pktsim::ConfigError> {
//! let config = SchedulerConfig {
//!     arrival_rate: 5.0,
//!     mean_service_time: Duration::from_millis(100),
//!     horizon: Duration::from_secs(10),
//!     processor_count: 1,
//!     priority_weights: vec![1.0],
//! };
//! let mut scheduler = Scheduler::new(config, Box::new(FifoQueue::new(1000)?))?;
//! scheduler.run(ChaChaRng::seed_from_u64(17));
//! assert!(scheduler.packets().iter().all(|p| !p.is_dropped()));
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::inline_always
)]

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

mod config;
pub use config::{ConfigError, SchedulerConfig};

mod event;
pub use event::{Event, EventKind, EventSet};

mod generator;
pub use generator::{Arrival, PacketGenerator};

mod observer;
pub use observer::{
    weak_observer, ObservationKind, ObserverList, QueueEvent, QueueHistoryObserver,
    QueueLengthObserver, QueueObserver,
};

mod packet;
pub use packet::{Dispatch, Packet, PacketHandle, PacketState};

mod processor;
pub use processor::Processor;

pub mod queue;
pub use queue::{FifoQueue, NppsQueue, PacketQueue, QueueKind, WrrQueue};

mod scheduler;
pub use scheduler::{ConfiguredGenerator, Scheduler};

pub mod stats;

/// Packet ID: the position of the packet in the generation order of a run.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
)]
pub struct PacketId(usize);

/// Processor ID: the index of a processor in the pool.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
)]
pub struct ProcessorId(usize);

/// Priority class of a packet. A higher value means a more urgent packet.
///
/// Classes are numbered from zero, and the number of classes in a run is given by the length of
/// [`SchedulerConfig::priority_weights`]. The three named classes cover the common setup.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
    Default,
)]
pub struct Priority(usize);

impl Priority {
    /// The lowest priority class.
    pub const LOW: Priority = Priority(0);
    /// The middle priority class of a three-class setup.
    pub const MEDIUM: Priority = Priority(1);
    /// The highest priority class of a three-class setup.
    pub const HIGH: Priority = Priority(2);
}
