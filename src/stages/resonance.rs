//! Two-body resonance reconstruction.

use crate::event::{Event, FieldKind, FieldSpec, FieldValue};
use crate::physics::{nominal_mass, Particle, Resonance};
use crate::stages::{Flow, Stage};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Options for the resonance builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResonanceOptions {
    /// Output resonance collection; the legs of the best candidate go to `<output>_legs`
    pub output: String,

    /// Collection the legs are taken from
    pub leg_collection: String,

    /// PDG id of the resonance
    pub pdgid: i32,

    /// Target mass in GeV, defaults to the nominal mass of `pdgid`
    #[serde(default)]
    pub mass: Option<f64>,
}

impl ResonanceOptions {
    /// Mass candidates are ranked against.
    pub fn target_mass(&self) -> Result<f64> {
        match self.mass {
            Some(mass) if mass > 0.0 => Ok(mass),
            Some(mass) => anyhow::bail!("Resonance mass must be > 0, got {}", mass),
            None => nominal_mass(self.pdgid).ok_or_else(|| {
                anyhow::anyhow!("No nominal mass for pdgid {}; set 'mass' explicitly", self.pdgid)
            }),
        }
    }

    pub fn legs_output(&self) -> String {
        format!("{}_legs", self.output)
    }

    pub fn validate(&self) -> Result<()> {
        self.target_mass().map(|_| ())
    }
}

/// Builds all two-leg candidates and sorts them by distance to the target mass.
pub struct ResonanceBuilder {
    name: String,
    opts: ResonanceOptions,
    target_mass: f64,
    legs_output: String,
}

impl ResonanceBuilder {
    pub fn new(name: String, opts: ResonanceOptions) -> Result<Self> {
        let target_mass = opts.target_mass()?;
        let legs_output = opts.legs_output();
        Ok(Self {
            name,
            opts,
            target_mass,
            legs_output,
        })
    }

    fn candidates(&self, legs: &[Particle]) -> Vec<Resonance> {
        let mut resonances = Vec::with_capacity(legs.len() * legs.len().saturating_sub(1) / 2);
        for (i, first) in legs.iter().enumerate() {
            for second in &legs[i + 1..] {
                resonances.push(Resonance::new(
                    vec![first.clone(), second.clone()],
                    self.opts.pdgid,
                ));
            }
        }
        let target = self.target_mass;
        resonances.sort_by(|a, b| (a.m() - target).abs().total_cmp(&(b.m() - target).abs()));
        resonances
    }
}

impl Stage for ResonanceBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::read(&self.opts.leg_collection, FieldKind::Particles),
            FieldSpec::write(&self.opts.output, FieldKind::Resonances),
            FieldSpec::write(&self.legs_output, FieldKind::Particles),
        ]
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        let resonances = self.candidates(event.particles(&self.opts.leg_collection)?);
        let best_legs = resonances
            .first()
            .map(|best| best.legs.clone())
            .unwrap_or_default();

        event.set(&self.opts.output, FieldValue::Resonances(resonances));
        event.set(&self.legs_output, FieldValue::Particles(best_legs));
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::InputEvent;
    use crate::physics::LorentzVector;

    fn lepton(uid: u64, p4: LorentzVector) -> Particle {
        Particle::new(uid, p4, 13, 1, 1)
    }

    fn options() -> ResonanceOptions {
        ResonanceOptions {
            output: "zeds".to_string(),
            leg_collection: "sel_iso_leptons".to_string(),
            pdgid: 23,
            mass: None,
        }
    }

    fn run(legs: Vec<Particle>) -> Event {
        let mut event = Event::new(0, InputEvent::default());
        event.set("sel_iso_leptons", FieldValue::Particles(legs));
        let mut builder = ResonanceBuilder::new("zeds".into(), options()).unwrap();
        builder.process(&mut event).unwrap();
        event
    }

    #[test]
    fn test_best_candidate_first() {
        // Pair (1, 2) has m = 91, pair (1, 3) has m = 60
        let legs = vec![
            lepton(1, LorentzVector::new(0.0, 0.0, 45.5, 45.5)),
            lepton(2, LorentzVector::new(0.0, 0.0, -45.5, 45.5)),
            lepton(3, LorentzVector::new(0.0, 0.0, -20.0 * 900.0 / 910.0, 20.0 * 900.0 / 910.0)),
        ];
        let event = run(legs);

        let zeds = event.resonances("zeds").unwrap();
        assert_eq!(zeds.len(), 3);
        assert!((zeds[0].m() - 91.0).abs() < 1e-9);
        assert!((zeds[0].m() - 91.1876).abs() <= (zeds[1].m() - 91.1876).abs());
        assert!((zeds[1].m() - 91.1876).abs() <= (zeds[2].m() - 91.1876).abs());

        let legs = event.particles("zeds_legs").unwrap();
        assert_eq!(legs.iter().map(|l| l.uid).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_fewer_than_two_legs() {
        let event = run(vec![lepton(1, LorentzVector::new(0.0, 0.0, 10.0, 10.0))]);
        assert!(event.resonances("zeds").unwrap().is_empty());
        assert!(event.particles("zeds_legs").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_pdgid_needs_mass() {
        let opts = ResonanceOptions {
            pdgid: 999,
            ..options()
        };
        assert!(ResonanceBuilder::new("x".into(), opts.clone()).is_err());

        let opts = ResonanceOptions {
            mass: Some(500.0),
            ..opts
        };
        assert!(ResonanceBuilder::new("x".into(), opts).is_ok());
    }

    #[test]
    fn test_declares_legs_field() {
        let builder = ResonanceBuilder::new("zeds".into(), options()).unwrap();
        assert!(builder
            .fields()
            .contains(&FieldSpec::write("zeds_legs", FieldKind::Particles)));
    }
}
