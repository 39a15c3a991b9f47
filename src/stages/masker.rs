//! Removal of one collection's particles from another.

use crate::event::{Event, FieldKind, FieldSpec, FieldValue};
use crate::physics::Particle;
use crate::stages::{Flow, Stage};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Options for the masker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskerOptions {
    pub output: String,
    pub input: String,
    /// Particles to remove from `input`, matched by identifier
    pub mask: String,
}

/// Copies `input` without the particles present in `mask`.
pub struct Masker {
    name: String,
    opts: MaskerOptions,
}

impl Masker {
    pub fn new(name: String, opts: MaskerOptions) -> Self {
        Self { name, opts }
    }
}

impl Stage for Masker {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::read(&self.opts.input, FieldKind::Particles),
            FieldSpec::read(&self.opts.mask, FieldKind::Particles),
            FieldSpec::write(&self.opts.output, FieldKind::Particles),
        ]
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        let masked: HashSet<u64> = event
            .particles(&self.opts.mask)?
            .iter()
            .map(|ptc| ptc.uid)
            .collect();
        let kept: Vec<Particle> = event
            .particles(&self.opts.input)?
            .iter()
            .filter(|ptc| !masked.contains(&ptc.uid))
            .cloned()
            .collect();
        event.set(&self.opts.output, FieldValue::Particles(kept));
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::InputEvent;
    use crate::physics::LorentzVector;

    fn ptc(uid: u64, e: f64) -> Particle {
        Particle::new(uid, LorentzVector::new(0.0, 0.0, e, e), 211, 1, 1)
    }

    #[test]
    fn test_masks_by_uid() {
        let mut event = Event::new(0, InputEvent::default());
        event.set("particles", FieldValue::Particles((1..=5).map(|i| ptc(i, 1.0)).collect()));
        // Smeared copies: same uid, different energy
        event.set("zeds_legs", FieldValue::Particles(vec![ptc(2, 1.3), ptc(4, 0.8)]));

        let mut masker = Masker::new(
            "particles_not_zed".into(),
            MaskerOptions {
                output: "particles_not_zed".to_string(),
                input: "particles".to_string(),
                mask: "zeds_legs".to_string(),
            },
        );
        masker.process(&mut event).unwrap();

        let uids: Vec<u64> = event
            .particles("particles_not_zed")
            .unwrap()
            .iter()
            .map(|p| p.uid)
            .collect();
        assert_eq!(uids, vec![1, 3, 5]);
    }
}
