//! Detector simulation stage.
//!
//! The simulation engine sits behind [`DetectorSimulator`]. The bundled
//! [`IdealDetector`] applies geometric acceptance and an energy threshold and
//! otherwise copies generated particles unchanged; resolution effects on
//! leptons are modelled separately by the lepton smearer.

use crate::event::{Event, FieldKind, FieldSpec, FieldValue};
use crate::physics::Particle;
use crate::stages::{Flow, Stage};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Detector description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Detector name, for display
    #[serde(default = "default_detector_name")]
    pub name: String,

    /// Acceptance in pseudorapidity
    #[serde(default = "default_max_abs_eta")]
    pub max_abs_eta: f64,

    /// Minimum particle energy in GeV
    #[serde(default)]
    pub min_energy: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            name: default_detector_name(),
            max_abs_eta: default_max_abs_eta(),
            min_energy: 0.0,
        }
    }
}

impl std::fmt::Display for DetectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Detector {}: |eta| < {:.2}, e >= {:.2} GeV",
            self.name, self.max_abs_eta, self.min_energy
        )
    }
}

/// Options for the simulation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOptions {
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Input generated particles
    #[serde(default = "default_gen_particles")]
    pub gen_particles: String,

    /// Output simulated particles
    #[serde(default = "default_sim_particles")]
    pub sim_particles: String,

    /// Output reconstructed particles
    #[serde(default = "default_rec_particles")]
    pub rec_particles: String,

    /// Print the reconstructed particles of every event
    #[serde(default)]
    pub display: bool,

    /// Log per-event particle counts
    #[serde(default)]
    pub verbose: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            gen_particles: default_gen_particles(),
            sim_particles: default_sim_particles(),
            rec_particles: default_rec_particles(),
            display: false,
            verbose: false,
        }
    }
}

impl SimulationOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.detector.max_abs_eta > 0.0) {
            anyhow::bail!("Detector acceptance max_abs_eta must be > 0");
        }
        if self.detector.min_energy < 0.0 {
            anyhow::bail!("Detector min_energy must be >= 0");
        }
        if self.sim_particles == self.rec_particles {
            anyhow::bail!("sim_particles and rec_particles must name different fields");
        }
        Ok(())
    }
}

fn default_detector_name() -> String { "CMS".to_string() }
fn default_max_abs_eta() -> f64 { 2.5 }
fn default_gen_particles() -> String { "gen_particles_stable".to_string() }
fn default_sim_particles() -> String { "sim_particles".to_string() }
fn default_rec_particles() -> String { "particles".to_string() }

/// Output of a detector simulation for one event.
#[derive(Debug, Clone, Default)]
pub struct SimulatedEvent {
    pub sim_particles: Vec<Particle>,
    pub rec_particles: Vec<Particle>,
}

/// A detector simulation engine.
pub trait DetectorSimulator {
    fn detector(&self) -> &DetectorConfig;

    fn simulate(&mut self, gen_particles: &[Particle]) -> Result<SimulatedEvent>;
}

/// Detector with perfect resolution inside its acceptance.
pub struct IdealDetector {
    config: DetectorConfig,
}

impl IdealDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    fn accepts(&self, ptc: &Particle) -> bool {
        ptc.is_stable()
            && !ptc.is_neutrino()
            && ptc.p4.eta().abs() < self.config.max_abs_eta
            && ptc.e() >= self.config.min_energy
    }
}

impl DetectorSimulator for IdealDetector {
    fn detector(&self) -> &DetectorConfig {
        &self.config
    }

    fn simulate(&mut self, gen_particles: &[Particle]) -> Result<SimulatedEvent> {
        let sim_particles: Vec<Particle> = gen_particles
            .iter()
            .filter(|ptc| self.accepts(ptc))
            .cloned()
            .collect();
        Ok(SimulatedEvent {
            rec_particles: sim_particles.clone(),
            sim_particles,
        })
    }
}

/// Runs a detector simulation on generated particles.
pub struct Simulation {
    name: String,
    opts: SimulationOptions,
    simulator: Box<dyn DetectorSimulator>,
}

impl Simulation {
    pub fn new(name: String, opts: SimulationOptions) -> Self {
        let simulator = Box::new(IdealDetector::new(opts.detector.clone()));
        Self::with_simulator(name, opts, simulator)
    }

    /// Use a custom simulation engine.
    pub fn with_simulator(
        name: String,
        opts: SimulationOptions,
        simulator: Box<dyn DetectorSimulator>,
    ) -> Self {
        Self {
            name,
            opts,
            simulator,
        }
    }
}

impl Stage for Simulation {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::read(&self.opts.gen_particles, FieldKind::Particles),
            FieldSpec::write(&self.opts.sim_particles, FieldKind::Particles),
            FieldSpec::write(&self.opts.rec_particles, FieldKind::Particles),
        ]
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        let simulated = self
            .simulator
            .simulate(event.particles(&self.opts.gen_particles)?)?;

        if self.opts.verbose {
            tracing::info!(
                "{}: event {}: {} simulated, {} reconstructed particles",
                self.name,
                event.index,
                simulated.sim_particles.len(),
                simulated.rec_particles.len()
            );
        }
        if self.opts.display {
            println!("--- {} display, event {} ---", self.name, event.index);
            for ptc in &simulated.rec_particles {
                println!("  {}", ptc);
            }
        }

        event.set(&self.opts.sim_particles, FieldValue::Particles(simulated.sim_particles));
        event.set(&self.opts.rec_particles, FieldValue::Particles(simulated.rec_particles));
        Ok(Flow::Continue)
    }

    fn describe(&self) -> Option<String> {
        Some(self.simulator.detector().to_string())
    }
}
