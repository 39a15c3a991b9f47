//! Lepton isolation with respect to the other particles of the event.

use crate::event::{Event, FieldKind, FieldSpec};
use crate::physics::{CollisionMode, IsolationSet, LorentzVector, Particle};
use crate::stages::{Flow, Stage};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Region around an object in which particles are counted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsoArea {
    /// Circle of the given radius in the angular plane
    EtaPhiCircle(f64),
}

impl IsoArea {
    pub fn contains(&self, mode: CollisionMode, center: &LorentzVector, p4: &LorentzVector) -> bool {
        match self {
            IsoArea::EtaPhiCircle(radius) => mode.delta_r(center, p4) < *radius,
        }
    }

    pub fn radius(&self) -> f64 {
        match self {
            IsoArea::EtaPhiCircle(radius) => *radius,
        }
    }
}

/// Options for the isolation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationOptions {
    /// Collection whose objects receive isolation sums (updated in place)
    pub leptons: String,

    /// Particles summed in the isolation area
    pub particles: String,

    #[serde(default = "default_iso_area")]
    pub iso_area: IsoArea,

    /// Inner area excluded from the sums, removing the lepton itself
    #[serde(default = "default_veto_area")]
    pub veto_area: IsoArea,
}

impl IsolationOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.iso_area.radius() > 0.0) {
            anyhow::bail!("Isolation area radius must be > 0");
        }
        if self.veto_area.radius() < 0.0 || self.veto_area.radius() >= self.iso_area.radius() {
            anyhow::bail!("Veto area radius must be in [0, isolation radius)");
        }
        Ok(())
    }
}

fn default_iso_area() -> IsoArea { IsoArea::EtaPhiCircle(0.4) }
fn default_veto_area() -> IsoArea { IsoArea::EtaPhiCircle(1e-5) }

/// Attaches [`IsolationSet`] sums to every object of a lepton collection.
pub struct LeptonIsolation {
    name: String,
    opts: IsolationOptions,
}

impl LeptonIsolation {
    pub fn new(name: String, opts: IsolationOptions) -> Self {
        Self { name, opts }
    }

    fn isolation(&self, mode: CollisionMode, lepton: &Particle, particles: &[Particle]) -> IsolationSet {
        let mut iso = IsolationSet::default();
        for ptc in particles {
            if self.opts.iso_area.contains(mode, &lepton.p4, &ptc.p4)
                && !self.opts.veto_area.contains(mode, &lepton.p4, &ptc.p4)
            {
                iso.add(ptc.pdgid, &ptc.p4);
            }
        }
        iso
    }
}

impl Stage for LeptonIsolation {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::read(&self.opts.particles, FieldKind::Particles),
            FieldSpec::update(&self.opts.leptons, FieldKind::Particles),
        ]
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        let mode = event.mode;
        let particles = event.particles(&self.opts.particles)?.to_vec();
        let leptons = event.particles_mut(&self.opts.leptons)?;
        for lepton in leptons.iter_mut() {
            let iso = self.isolation(mode, lepton, &particles);
            lepton.iso = Some(iso);
        }
        Ok(Flow::Continue)
    }
}
