//! Conversion of raw input collections into particles.

use crate::event::{Event, FieldKind, FieldSpec, FieldValue};
use crate::physics::{CollisionMode, LorentzVector, Particle};
use crate::stages::{Flow, Stage};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Options for the reader stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Beam configuration of the input events
    #[serde(default)]
    pub mode: CollisionMode,

    /// Name of the generated-particle collection in the input files
    #[serde(default = "default_gen_particles")]
    pub gen_particles: String,

    /// Field receiving all generated particles
    #[serde(default = "default_output")]
    pub output: String,

    /// Field receiving the stable (status 1) generated particles
    #[serde(default = "default_stable_output")]
    pub stable_output: String,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            mode: CollisionMode::default(),
            gen_particles: default_gen_particles(),
            output: default_output(),
            stable_output: default_stable_output(),
        }
    }
}

fn default_gen_particles() -> String { "GenParticle".to_string() }
fn default_output() -> String { "gen_particles".to_string() }
fn default_stable_output() -> String { "gen_particles_stable".to_string() }

/// Reads generated particles from the raw input collections.
///
/// Particles receive identifiers `1..=n` in input order.
pub struct Reader {
    name: String,
    opts: ReaderOptions,
}

impl Reader {
    pub fn new(name: String, opts: ReaderOptions) -> Self {
        Self { name, opts }
    }
}

impl Stage for Reader {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::write(&self.opts.output, FieldKind::Particles),
            FieldSpec::write(&self.opts.stable_output, FieldKind::Particles),
        ]
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        let records = event
            .input()
            .collection(&self.opts.gen_particles)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Input event has no collection '{}'",
                    self.opts.gen_particles
                )
            })?;

        let particles: Vec<Particle> = records
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                Particle::new(
                    i as u64 + 1,
                    LorentzVector::new(rec.px, rec.py, rec.pz, rec.e),
                    rec.pdgid,
                    rec.charge,
                    rec.status,
                )
            })
            .collect();
        let stable: Vec<Particle> = particles.iter().filter(|p| p.is_stable()).cloned().collect();

        event.mode = self.opts.mode;
        event.set(&self.opts.output, FieldValue::Particles(particles));
        event.set(&self.opts.stable_output, FieldValue::Particles(stable));
        Ok(Flow::Continue)
    }
}
