//! Recoil four-momentum against a set of particles.

use crate::event::{Event, FieldKind, FieldSpec, FieldValue};
use crate::physics::{LorentzVector, Particle};
use crate::stages::{Flow, Stage};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Options for the recoil builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoilOptions {
    #[serde(default = "default_output")]
    pub output: String,

    /// Centre-of-mass energy in GeV; the initial state is at rest
    pub sqrts: f64,

    /// Particles subtracted from the initial state
    pub to_remove: String,
}

impl RecoilOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.sqrts.is_finite() || self.sqrts <= 0.0 {
            anyhow::bail!("sqrts must be > 0, got {}", self.sqrts);
        }
        Ok(())
    }
}

fn default_output() -> String { "recoil".to_string() }

/// Computes `p_initial - sum(to_remove)`.
pub struct RecoilBuilder {
    name: String,
    opts: RecoilOptions,
}

impl RecoilBuilder {
    pub fn new(name: String, opts: RecoilOptions) -> Self {
        Self { name, opts }
    }
}

impl Stage for RecoilBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::read(&self.opts.to_remove, FieldKind::Particles),
            FieldSpec::write(&self.opts.output, FieldKind::Particle),
        ]
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        let removed: LorentzVector = event
            .particles(&self.opts.to_remove)?
            .iter()
            .map(|ptc| ptc.p4)
            .sum();
        let recoil = LorentzVector::at_rest(self.opts.sqrts) - removed;
        event.set(&self.opts.output, FieldValue::Particle(Particle::composite(recoil)));
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::InputEvent;
    use crate::physics::COMPOSITE_UID;
    use approx::assert_relative_eq;

    fn options(sqrts: f64) -> RecoilOptions {
        RecoilOptions {
            output: "recoil".to_string(),
            sqrts,
            to_remove: "zeds_legs".to_string(),
        }
    }

    #[test]
    fn test_recoil_mass() {
        // Legs sum to (0, 0, 50, 100)
        let legs = vec![
            Particle::new(1, LorentzVector::new(30.0, 0.0, 25.0, 50.0), 13, -1, 1),
            Particle::new(2, LorentzVector::new(-30.0, 0.0, 25.0, 50.0), -13, 1, 1),
        ];
        let mut event = Event::new(0, InputEvent::default());
        event.set("zeds_legs", FieldValue::Particles(legs));

        RecoilBuilder::new("recoil".into(), options(240.0))
            .process(&mut event)
            .unwrap();

        let recoil = event.particle("recoil").unwrap();
        assert_eq!(recoil.uid, COMPOSITE_UID);
        assert_eq!(recoil.p4, LorentzVector::new(0.0, 0.0, -50.0, 140.0));
        assert_relative_eq!(recoil.p4.m(), (140.0f64 * 140.0 - 50.0 * 50.0).sqrt());
    }

    #[test]
    fn test_nothing_removed() {
        let mut event = Event::new(0, InputEvent::default());
        event.set("zeds_legs", FieldValue::Particles(vec![]));
        RecoilBuilder::new("recoil".into(), options(240.0))
            .process(&mut event)
            .unwrap();
        assert_relative_eq!(event.particle("recoil").unwrap().p4.m(), 240.0);
    }

    #[test]
    fn test_validate_sqrts() {
        assert!(options(0.0).validate().is_err());
        assert!(options(f64::NAN).validate().is_err());
        assert!(options(240.0).validate().is_ok());
    }
}
