//! Simple lepton resolution and efficiency model.

use crate::event::{Event, FieldKind, FieldSpec, FieldValue};
use crate::physics::Particle;
use crate::stages::{Flow, LoopContext, Stage};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Options for the lepton smearer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmearerOptions {
    pub input_objects: String,
    pub output: String,

    /// Relative energy resolution (Gaussian width of the scale factor)
    #[serde(default)]
    pub energy_resolution: f64,

    /// Probability to keep each object
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
}

impl SmearerOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.efficiency) {
            anyhow::bail!("Efficiency must be in [0, 1], got {}", self.efficiency);
        }
        if !self.energy_resolution.is_finite() || self.energy_resolution < 0.0 {
            anyhow::bail!("Energy resolution must be >= 0, got {}", self.energy_resolution);
        }
        Ok(())
    }
}

fn default_efficiency() -> f64 { 1.0 }

/// Copies a collection, dropping objects with probability `1 - efficiency`
/// and scaling the four-momentum of the others by `N(1, energy_resolution)`.
///
/// With the default options the output is an exact copy of the input.
pub struct LeptonSmearer {
    name: String,
    opts: SmearerOptions,
    scale: Normal<f64>,
    rng: StdRng,
}

impl LeptonSmearer {
    pub fn new(name: String, opts: SmearerOptions) -> Result<Self> {
        let scale = Normal::new(1.0, opts.energy_resolution)
            .map_err(|e| anyhow::anyhow!("Invalid energy resolution: {}", e))?;
        Ok(Self {
            name,
            opts,
            scale,
            rng: StdRng::seed_from_u64(0),
        })
    }

    fn smear(&mut self, ptc: &Particle) -> Option<Particle> {
        if self.opts.efficiency < 1.0 && self.rng.random::<f64>() >= self.opts.efficiency {
            return None;
        }
        let mut smeared = ptc.clone();
        if self.opts.energy_resolution > 0.0 {
            let factor = self.scale.sample(&mut self.rng).max(0.0);
            smeared.p4 = ptc.p4.scaled(factor);
        }
        Some(smeared)
    }
}

impl Stage for LeptonSmearer {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::read(&self.opts.input_objects, FieldKind::Particles),
            FieldSpec::write(&self.opts.output, FieldKind::Particles),
        ]
    }

    fn begin_loop(&mut self, ctx: &LoopContext) -> Result<()> {
        self.rng = StdRng::seed_from_u64(ctx.stage_seed());
        Ok(())
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        let input = event.particles(&self.opts.input_objects)?.to_vec();
        let output: Vec<Particle> = input.iter().filter_map(|ptc| self.smear(ptc)).collect();
        event.set(&self.opts.output, FieldValue::Particles(output));
        Ok(Flow::Continue)
    }
}
