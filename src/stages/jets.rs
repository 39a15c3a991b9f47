//! Jet clustering stage.
//!
//! Clustering sits behind [`JetClusterer`]. The bundled [`DurhamClusterer`]
//! is the exclusive e+e- kt algorithm with E-scheme recombination:
//!
//! ```text
//! d_ij = 2 min(E_i^2, E_j^2) (1 - cos theta_ij)      y_ij = d_ij / E_vis^2
//! ```
//!
//! The closest pair is merged until `njets` remain, or until the smallest
//! `y_ij` reaches `dcut`.

use crate::event::{Event, FieldKind, FieldSpec, FieldValue};
use crate::physics::{Jet, LorentzVector, Particle};
use crate::stages::{Flow, Stage};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Exclusive clustering target: a jet count or a resolution cut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JetDefinition {
    #[serde(default)]
    pub njets: Option<usize>,
    #[serde(default)]
    pub dcut: Option<f64>,
}

impl JetDefinition {
    pub fn exclusive_njets(njets: usize) -> Self {
        Self {
            njets: Some(njets),
            dcut: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match (self.njets, self.dcut) {
            (Some(0), None) => anyhow::bail!("njets must be > 0"),
            (Some(_), None) => Ok(()),
            (None, Some(dcut)) if dcut > 0.0 && dcut < 1.0 => Ok(()),
            (None, Some(dcut)) => anyhow::bail!("dcut must be in (0, 1), got {}", dcut),
            _ => anyhow::bail!("Jet definition needs exactly one of njets or dcut"),
        }
    }
}

/// A jet clustering algorithm.
pub trait JetClusterer {
    fn cluster(&self, particles: &[Particle], definition: &JetDefinition) -> Result<Vec<Jet>>;
}

/// Exclusive Durham clustering.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurhamClusterer;

impl DurhamClusterer {
    fn distance(a: &LorentzVector, b: &LorentzVector) -> f64 {
        let e2 = (a.e * a.e).min(b.e * b.e);
        2.0 * e2 * (1.0 - a.cos_angle(b))
    }

    /// Closest pair `(i, j, d_ij)` with `i < j`.
    fn closest_pair(jets: &[Jet]) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..jets.len() {
            for j in (i + 1)..jets.len() {
                let d = Self::distance(&jets[i].p4, &jets[j].p4);
                if best.is_none_or(|(_, _, best_d)| d < best_d) {
                    best = Some((i, j, d));
                }
            }
        }
        best
    }
}

impl JetClusterer for DurhamClusterer {
    fn cluster(&self, particles: &[Particle], definition: &JetDefinition) -> Result<Vec<Jet>> {
        definition.validate()?;

        let evis: f64 = particles.iter().map(|ptc| ptc.e()).sum();
        let mut jets: Vec<Jet> = particles
            .iter()
            .map(|ptc| Jet {
                p4: ptc.p4,
                constituents: vec![ptc.uid],
            })
            .collect();

        loop {
            if let Some(njets) = definition.njets {
                if jets.len() <= njets {
                    break;
                }
            }
            let Some((i, j, d)) = Self::closest_pair(&jets) else {
                break;
            };
            if let Some(dcut) = definition.dcut {
                if evis <= 0.0 || d / (evis * evis) >= dcut {
                    break;
                }
            }
            let merged = jets.swap_remove(j);
            jets[i].p4 += merged.p4;
            jets[i].constituents.extend(merged.constituents);
        }

        jets.sort_by(|a, b| b.p4.e.total_cmp(&a.p4.e));
        Ok(jets)
    }
}

/// Options for the jet clusterizer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JetClusterizerOptions {
    /// Input particles
    pub particles: String,

    /// Output jet collection
    #[serde(default = "default_output")]
    pub output: String,

    pub jet_definition: JetDefinition,
}

impl JetClusterizerOptions {
    pub fn validate(&self) -> Result<()> {
        self.jet_definition.validate()
    }
}

fn default_output() -> String { "jets".to_string() }

/// Clusters a particle collection into jets.
pub struct JetClusterizer {
    name: String,
    opts: JetClusterizerOptions,
    clusterer: Box<dyn JetClusterer>,
}

impl JetClusterizer {
    pub fn new(name: String, opts: JetClusterizerOptions) -> Self {
        Self::with_clusterer(name, opts, Box::new(DurhamClusterer))
    }

    /// Use a custom clustering algorithm.
    pub fn with_clusterer(
        name: String,
        opts: JetClusterizerOptions,
        clusterer: Box<dyn JetClusterer>,
    ) -> Self {
        Self {
            name,
            opts,
            clusterer,
        }
    }
}

impl Stage for JetClusterizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::read(&self.opts.particles, FieldKind::Particles),
            FieldSpec::write(&self.opts.output, FieldKind::Jets),
        ]
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        let jets = self
            .clusterer
            .cluster(event.particles(&self.opts.particles)?, &self.opts.jet_definition)?;
        event.set(&self.opts.output, FieldValue::Jets(jets));
        Ok(Flow::Continue)
    }
}
