//! Predicate-based selection of a particle collection.

use crate::event::{Event, FieldKind, FieldSpec, FieldValue};
use crate::physics::{Particle, Predicate};
use crate::stages::{Flow, Stage};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Options for the filter stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Input collection
    pub input_objects: String,
    /// Output collection
    pub output: String,
    /// Objects passing this predicate are kept
    pub filter_func: Predicate,
}

/// Copies the objects of a collection that pass a predicate, keeping order.
pub struct Filter {
    name: String,
    opts: FilterOptions,
}

impl Filter {
    pub fn new(name: String, opts: FilterOptions) -> Self {
        Self { name, opts }
    }
}

impl Stage for Filter {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::read(&self.opts.input_objects, FieldKind::Particles),
            FieldSpec::write(&self.opts.output, FieldKind::Particles),
        ]
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        let mut selected: Vec<Particle> = Vec::new();
        for ptc in event.particles(&self.opts.input_objects)? {
            if self.opts.filter_func.evaluate(ptc)? {
                selected.push(ptc.clone());
            }
        }
        event.set(&self.opts.output, FieldValue::Particles(selected));
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::InputEvent;
    use crate::physics::LorentzVector;

    fn ptc(uid: u64, pdgid: i32, e: f64) -> Particle {
        Particle::new(uid, LorentzVector::new(e, 0.0, 0.0, e), pdgid, 0, 1)
    }

    fn lepton_filter() -> Filter {
        Filter::new(
            "sel_leptons".into(),
            FilterOptions {
                input_objects: "particles".to_string(),
                output: "leptons_true".to_string(),
                filter_func: Predicate::All(vec![
                    Predicate::EnergyAbove(10.0),
                    Predicate::AbsPdgidIn(vec![11, 13]),
                ]),
            },
        )
    }

    #[test]
    fn test_selects_leptons_in_order() {
        let mut event = Event::new(0, InputEvent::default());
        event.set(
            "particles",
            FieldValue::Particles(vec![
                ptc(1, 13, 40.0),
                ptc(2, 211, 40.0),
                ptc(3, -11, 5.0),
                ptc(4, -11, 30.0),
            ]),
        );

        lepton_filter().process(&mut event).unwrap();

        let uids: Vec<u64> = event.particles("leptons_true").unwrap().iter().map(|p| p.uid).collect();
        assert_eq!(uids, vec![1, 4]);
        // Input untouched
        assert_eq!(event.particles("particles").unwrap().len(), 4);
    }

    #[test]
    fn test_empty_input() {
        let mut event = Event::new(0, InputEvent::default());
        event.set("particles", FieldValue::Particles(vec![]));
        lepton_filter().process(&mut event).unwrap();
        assert!(event.particles("leptons_true").unwrap().is_empty());
    }

    #[test]
    fn test_predicate_error_propagates() {
        let mut filter = Filter::new(
            "sel_iso_leptons".into(),
            FilterOptions {
                input_objects: "leptons".to_string(),
                output: "sel_iso_leptons".to_string(),
                filter_func: Predicate::RelIsoBelow(0.3),
            },
        );
        let mut event = Event::new(0, InputEvent::default());
        event.set("leptons", FieldValue::Particles(vec![ptc(1, 13, 40.0)]));
        assert!(filter.process(&mut event).is_err());
    }
}
