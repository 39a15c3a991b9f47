//! Analysis stages and the descriptors that configure them.
//!
//! A [`StageConfig`] is an immutable descriptor: a unique name plus a
//! capability ([`StageKind`]) carrying its options. Building a descriptor
//! yields a fresh [`Stage`] that the looper drives once per event.
//!
//! ```text
//! reader ─▶ simulation ─▶ filter ─▶ smearer ─▶ isolation ─▶ filter
//!        ─▶ resonance ─▶ recoil ─▶ masker ─▶ jets ─▶ selection ─▶ tree
//! ```

mod filter;
mod isolation;
mod jets;
mod masker;
mod reader;
mod recoil;
mod resonance;
mod selection;
mod simulation;
mod smearer;
mod tree;

pub use filter::{Filter, FilterOptions};
pub use isolation::{IsoArea, IsolationOptions, LeptonIsolation};
pub use jets::{DurhamClusterer, JetClusterer, JetClusterizer, JetClusterizerOptions, JetDefinition};
pub use masker::{Masker, MaskerOptions};
pub use reader::{Reader, ReaderOptions};
pub use recoil::{RecoilBuilder, RecoilOptions};
pub use resonance::{ResonanceBuilder, ResonanceOptions};
pub use selection::{Selection, SelectionOptions};
pub use simulation::{
    DetectorConfig, DetectorSimulator, IdealDetector, SimulatedEvent, Simulation, SimulationOptions,
};
pub use smearer::{LeptonSmearer, SmearerOptions};
pub use tree::{TreeProducer, TreeProducerOptions};

use crate::event::{Event, FieldSpec, Schema};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the looper should do after a stage has processed an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next stage
    Continue,
    /// Skip the remaining stages for this event
    Stop,
}

/// Per-loop information handed to each stage before the first event.
#[derive(Debug, Clone)]
pub struct LoopContext {
    /// Seed for stage random number generators
    pub seed: u64,
    /// Position of the stage in the sequence
    pub stage_index: usize,
}

impl LoopContext {
    /// Seed unique to this stage, derived from the loop seed.
    pub fn stage_seed(&self) -> u64 {
        self.seed
            .wrapping_add((self.stage_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

/// One unit of per-event processing.
pub trait Stage {
    /// Unique name within the sequence.
    fn name(&self) -> &str;

    /// Fields this stage reads, writes or updates.
    fn fields(&self) -> Vec<FieldSpec>;

    /// Called once before the first event.
    fn begin_loop(&mut self, _ctx: &LoopContext) -> Result<()> {
        Ok(())
    }

    /// Process one event.
    fn process(&mut self, event: &mut Event) -> Result<Flow>;

    /// Called once after the last event.
    fn end_loop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Write outputs into the stage's own directory.
    ///
    /// Only stages that produce files create the directory.
    fn write(&mut self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    /// Human-readable description for interactive display.
    fn describe(&self) -> Option<String> {
        None
    }
}

/// Stage capability with its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Reader(ReaderOptions),
    Simulation(SimulationOptions),
    Filter(FilterOptions),
    LeptonSmearer(SmearerOptions),
    Isolation(IsolationOptions),
    ResonanceBuilder(ResonanceOptions),
    RecoilBuilder(RecoilOptions),
    Masker(MaskerOptions),
    JetClusterizer(JetClusterizerOptions),
    Selection(SelectionOptions),
    TreeProducer(TreeProducerOptions),
}

impl StageKind {
    /// Short capability name, as written in configuration files.
    pub fn kind_name(&self) -> &'static str {
        match self {
            StageKind::Reader(_) => "reader",
            StageKind::Simulation(_) => "simulation",
            StageKind::Filter(_) => "filter",
            StageKind::LeptonSmearer(_) => "lepton_smearer",
            StageKind::Isolation(_) => "isolation",
            StageKind::ResonanceBuilder(_) => "resonance_builder",
            StageKind::RecoilBuilder(_) => "recoil_builder",
            StageKind::Masker(_) => "masker",
            StageKind::JetClusterizer(_) => "jet_clusterizer",
            StageKind::Selection(_) => "selection",
            StageKind::TreeProducer(_) => "tree_producer",
        }
    }

    /// Check option values that do not depend on other stages.
    pub fn validate(&self) -> Result<()> {
        match self {
            StageKind::Simulation(opts) => opts.validate(),
            StageKind::LeptonSmearer(opts) => opts.validate(),
            StageKind::Isolation(opts) => opts.validate(),
            StageKind::ResonanceBuilder(opts) => opts.validate(),
            StageKind::RecoilBuilder(opts) => opts.validate(),
            StageKind::JetClusterizer(opts) => opts.validate(),
            StageKind::Reader(_)
            | StageKind::Filter(_)
            | StageKind::Masker(_)
            | StageKind::Selection(_)
            | StageKind::TreeProducer(_) => Ok(()),
        }
    }
}

/// Immutable descriptor of one named stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Unique stage name, also the name of its output directory
    pub name: String,

    /// Capability and options
    pub stage: StageKind,
}

impl StageConfig {
    pub fn new(name: impl Into<String>, stage: StageKind) -> Self {
        Self {
            name: name.into(),
            stage,
        }
    }

    /// Construct a runnable stage.
    pub fn build(&self) -> Result<Box<dyn Stage>> {
        self.stage
            .validate()
            .with_context(|| format!("Invalid options for stage '{}'", self.name))?;

        let name = self.name.clone();
        let stage: Box<dyn Stage> = match &self.stage {
            StageKind::Reader(opts) => Box::new(Reader::new(name, opts.clone())),
            StageKind::Simulation(opts) => Box::new(Simulation::new(name, opts.clone())),
            StageKind::Filter(opts) => Box::new(Filter::new(name, opts.clone())),
            StageKind::LeptonSmearer(opts) => Box::new(LeptonSmearer::new(name, opts.clone())?),
            StageKind::Isolation(opts) => Box::new(LeptonIsolation::new(name, opts.clone())),
            StageKind::ResonanceBuilder(opts) => {
                Box::new(ResonanceBuilder::new(name, opts.clone())?)
            }
            StageKind::RecoilBuilder(opts) => Box::new(RecoilBuilder::new(name, opts.clone())),
            StageKind::Masker(opts) => Box::new(Masker::new(name, opts.clone())),
            StageKind::JetClusterizer(opts) => Box::new(JetClusterizer::new(name, opts.clone())),
            StageKind::Selection(opts) => Box::new(Selection::new(name, opts.clone())),
            StageKind::TreeProducer(opts) => Box::new(TreeProducer::new(name, opts.clone())),
        };
        Ok(stage)
    }
}

/// A built stage sequence with its resolved field schema.
pub struct Sequence {
    stages: Vec<Box<dyn Stage>>,
    schema: Schema,
}

impl Sequence {
    /// Build every stage in order and check their field declarations.
    ///
    /// Fails on the first construction fault or on any schema violation.
    pub fn build(configs: &[StageConfig]) -> Result<Self> {
        let stages = configs
            .iter()
            .map(|config| {
                config
                    .build()
                    .with_context(|| format!("Failed to build stage '{}'", config.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let declared: Vec<(String, Vec<FieldSpec>)> = stages
            .iter()
            .map(|stage| (stage.name().to_string(), stage.fields()))
            .collect();
        let schema = Schema::check(
            declared
                .iter()
                .map(|(name, specs)| (name.as_str(), specs.as_slice())),
        )?;

        Ok(Self { stages, schema })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    pub fn stages_mut(&mut self) -> &mut [Box<dyn Stage>] {
        &mut self.stages
    }
}
