//! heppipe
//!
//! Declarative event-processing pipeline for e+e- collider analyses. A run
//! configuration names an ordered sequence of analysis stages and the input
//! datasets they run over; the looper drives every event through the sequence
//! and each stage writes its own outputs.
//!
//! # Architecture
//!
//! - **Physics**: Lorentz vectors, particles, resonances, jets and selection predicates
//! - **Event**: The typed per-event record and the field schema checked at build time
//! - **I/O**: Random-access event sources
//! - **Stages**: Reader, detector simulation, filters, isolation, resonances, recoil,
//!   masking, jet clustering, cut flow and tree output
//! - **Pipeline**: Component chunking, the looper, scheduling and metrics
//!
//! # Usage
//!
//! ```no_run
//! use heppipe::{run_pipeline, Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml".as_ref())?;
//!     run_pipeline(config)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod event;
pub mod io;
pub mod physics;
pub mod pipeline;
pub mod stages;

pub use config::{ComponentConfig, Config, LooperConfig};
pub use event::{Event, Schema};
pub use pipeline::{Looper, Metrics, RunStats, Scheduler, SchedulerConfig};
pub use stages::{Sequence, StageConfig, StageKind};

use anyhow::Result;
use std::sync::Arc;

/// Run every chunk of every component with the given configuration.
pub fn run_pipeline(config: Config) -> Result<RunStats> {
    config.validate()?;

    tracing::info!("Starting heppipe run");

    // Fail on a bad sequence before any input is opened
    let sequence = Sequence::build(&config.sequence)?;
    tracing::info!("Sequence: {}", sequence.names().join(" -> "));

    let metrics = Metrics::new(&sequence.names());
    let scheduler_config = SchedulerConfig::from_config(&config);
    let scheduler = Scheduler::new(Arc::new(config), metrics, scheduler_config);

    let stats = scheduler.run()?;
    tracing::info!("Run complete: {}", stats);

    Ok(stats)
}

/// The configuration used in interactive mode: every simulation stage
/// displays its events.
pub fn interactive_config(mut config: Config) -> Config {
    for stage in &mut config.sequence {
        if let StageKind::Simulation(opts) = &mut stage.stage {
            opts.display = true;
        }
    }
    config
}

/// Process a single event of the first chunk with the detector display on.
///
/// Nothing is written to disk. Returns the event record.
pub fn run_single_event(config: Config, iev: usize) -> Result<Event> {
    config.validate()?;
    let config = interactive_config(config);

    let chunk = config
        .components
        .iter()
        .flat_map(pipeline::split_component)
        .next()
        .ok_or_else(|| anyhow::anyhow!("No component to read from"))?;

    let names: Vec<String> = config.sequence.iter().map(|s| s.name.clone()).collect();
    let mut looper = Looper::new(&config, chunk, Metrics::new(&names))?;
    looper.begin()?;
    let event = looper.process(iev)?;

    for stage in looper.sequence().stages() {
        if let Some(description) = stage.describe() {
            println!("{}: {}", stage.name(), description);
        }
    }
    println!("{}", event);

    Ok(event)
}

/// Initialize the Rayon thread pool.
pub fn init_rayon(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }
    Ok(())
}
