//! Packet queueing simulation application.
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

use std::convert::TryFrom;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use humantime::parse_duration;
use indicatif::{ProgressBar, ProgressStyle};
use rand_chacha::{rand_core::SeedableRng, ChaChaRng};

use pktsim::stats::{PacketRecord, Probes, Report};
use pktsim::{QueueKind, Scheduler, SchedulerConfig};

struct DurationArg(Duration);

impl FromStr for DurationArg {
    type Err = eyre::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s).wrap_err("invalid time").map(DurationArg)
    }
}

/// Comma-separated list of values.
struct ListArg<T>(Vec<T>);

impl<T> FromStr for ListArg<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    type Err = eyre::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(|value| {
                value
                    .trim()
                    .parse::<T>()
                    .wrap_err_with(|| format!("invalid list element: `{}`", value))
            })
            .collect::<eyre::Result<Vec<_>>>()
            .map(ListArg)
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
enum Format {
    /// Human-readable summary.
    Text,
    /// Summary as a JSON object.
    Json,
    /// One row per generated packet.
    Csv,
}

/// Runs packet queueing simulation.
#[derive(Parser)]
#[clap(version, author)]
struct Opt {
    /// Expected number of packet arrivals per second.
    #[clap(long, default_value = "5")]
    arrival_rate: f64,

    /// Expected service time of a packet, e.g., `100ms`.
    #[clap(long, default_value = "100ms")]
    mean_service_time: DurationArg,

    /// Simulated time at which the simulation stops, e.g., `10s`.
    #[clap(long, default_value = "10s")]
    horizon: DurationArg,

    /// Number of processors.
    #[clap(short, long, default_value = "1")]
    processors: usize,

    /// Comma-separated relative frequencies of priority classes, from the lowest class.
    #[clap(long, default_value = "0.2,0.3,0.5")]
    priority_weights: ListArg<f64>,

    /// Queueing discipline: fifo, wrr, or npps.
    #[clap(short, long, default_value = "fifo")]
    queue: QueueKind,

    /// Capacity of each leaf queue.
    #[clap(long, default_value = "10")]
    capacity: usize,

    /// Comma-separated dispatch weights of priority classes for the wrr discipline, from the
    /// lowest class. By default, class `i` has weight `i + 1`.
    #[clap(long)]
    wrr_weights: Option<ListArg<usize>>,

    /// Seed to use for random number generator.
    #[clap(short, long)]
    seed: Option<u64>,

    /// Output format: text, json, or csv.
    #[clap(short, long, default_value = "text")]
    format: Format,

    /// Verbosity.
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,

    /// Store the logs this file.
    #[clap(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[clap(long)]
    no_stderr: bool,
}

struct SimulationConfig {
    scheduler: SchedulerConfig,
    queue: QueueKind,
    capacity: usize,
    wrr_weights: Vec<usize>,
    seed: Option<u64>,
    format: Format,
}

impl TryFrom<Opt> for SimulationConfig {
    type Error = eyre::Error;
    fn try_from(opt: Opt) -> eyre::Result<Self> {
        let scheduler = SchedulerConfig {
            arrival_rate: opt.arrival_rate,
            mean_service_time: opt.mean_service_time.0,
            horizon: opt.horizon.0,
            processor_count: opt.processors,
            priority_weights: opt.priority_weights.0,
        };
        scheduler
            .validate()
            .wrap_err("invalid simulation configuration")?;
        let wrr_weights = opt
            .wrr_weights
            .map_or_else(|| (1..=scheduler.num_classes()).collect(), |w| w.0);
        Ok(Self {
            scheduler,
            queue: opt.queue,
            capacity: opt.capacity,
            wrr_weights,
            seed: opt.seed,
            format: opt.format,
        })
    }
}

impl SimulationConfig {
    /// Runs the simulation and prints the results to the standard output.
    fn run(&self) -> eyre::Result<()> {
        let queue = self
            .queue
            .build(self.capacity, &self.wrr_weights)
            .wrap_err("invalid queue configuration")?;
        let mut scheduler = Scheduler::new(self.scheduler.clone(), queue)
            .wrap_err("invalid simulation configuration")?;
        let probes = Probes::attach(scheduler.queue_mut());

        let rng = if let Some(seed) = self.seed {
            ChaChaRng::seed_from_u64(seed)
        } else {
            ChaChaRng::from_entropy()
        };
        let arrivals = scheduler.generator(rng);
        scheduler.schedule_arrivals(arrivals);
        log::info!(
            "Simulating {} arrivals on {} with {} processor(s)",
            scheduler.packets().len(),
            scheduler.queue(),
            scheduler.processors().len()
        );
        run_with_progress(&mut scheduler);

        let stdout = io::stdout();
        let mut writer = stdout.lock();
        match self.format {
            Format::Text => {
                write!(writer, "{}", Report::new(&scheduler, &probes))?;
            }
            Format::Json => {
                serde_json::to_writer_pretty(&mut writer, &Report::new(&scheduler, &probes))?;
                writeln!(writer)?;
            }
            Format::Csv => {
                let mut csv_writer = csv::Writer::from_writer(writer);
                for packet in scheduler.packets() {
                    csv_writer
                        .serialize(PacketRecord::from(packet))
                        .wrap_err("unable to write packet record")?;
                }
                csv_writer.flush()?;
            }
        }
        Ok(())
    }
}

/// Processes all events, showing the progress in simulated seconds.
fn run_with_progress(scheduler: &mut Scheduler) {
    let horizon = scheduler.config().horizon;
    let pb = ProgressBar::new(horizon.as_secs())
        .with_style(ProgressStyle::default_bar().template("{msg} {wide_bar} {percent}%"));
    while scheduler.step() {
        let secs = scheduler.time().as_secs();
        if pb.position() < secs {
            pb.set_position(secs);
            pb.set_message(&format!(
                "[{time}s] [Q={queued}] [E={events}]",
                time = secs,
                queued = scheduler.queue().len(),
                events = scheduler.pending_events(),
            ));
        }
    }
    pb.finish();
}

/// Set up a logger based on the given user options.
fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let log_level = match opt.verbose {
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        3 => log::LevelFilter::Trace,
        _ => log::LevelFilter::Warn,
    };
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(log_level);
    let dispatch = if let Some(path) = &opt.log_output {
        let _ = std::fs::remove_file(path);
        dispatch.chain(
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .append(false)
                .open(path)?,
        )
    } else {
        dispatch
    };
    let dispatch = if opt.no_stderr {
        dispatch
    } else {
        dispatch.chain(std::io::stderr())
    };
    dispatch.apply()?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::parse();
    set_up_logger(&opt)?;
    let conf = SimulationConfig::try_from(opt)?;
    conf.run()
}
