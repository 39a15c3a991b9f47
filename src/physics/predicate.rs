//! Serializable selection predicates over particles.
//!
//! Predicates are written in configuration files as nested single-key maps:
//!
//! ```yaml
//! filter_func:
//!   all:
//!     - energy_above: 10.0
//!     - abs_pdgid_in: [11, 13]
//! ```

use crate::physics::Particle;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A boolean test on a single particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// True if every sub-predicate is true (true when empty)
    All(Vec<Predicate>),
    /// True if any sub-predicate is true (false when empty)
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    /// `e > threshold`
    EnergyAbove(f64),
    /// `e < threshold`
    EnergyBelow(f64),
    /// `pt > threshold`
    PtAbove(f64),
    /// `|eta| < threshold`
    AbsEtaBelow(f64),
    /// `|pdgid|` is one of the listed values
    AbsPdgidIn(Vec<i32>),
    /// Non-zero electric charge
    Charged,
    /// Relative isolation `iso.all.sumpt / pt < threshold`.
    /// Requires the isolation stage to have run on the collection.
    RelIsoBelow(f64),
}

impl Predicate {
    pub fn evaluate(&self, ptc: &Particle) -> Result<bool> {
        Ok(match self {
            Predicate::All(preds) => {
                for pred in preds {
                    if !pred.evaluate(ptc)? {
                        return Ok(false);
                    }
                }
                true
            }
            Predicate::Any(preds) => {
                for pred in preds {
                    if pred.evaluate(ptc)? {
                        return Ok(true);
                    }
                }
                false
            }
            Predicate::Not(pred) => !pred.evaluate(ptc)?,
            Predicate::EnergyAbove(threshold) => ptc.e() > *threshold,
            Predicate::EnergyBelow(threshold) => ptc.e() < *threshold,
            Predicate::PtAbove(threshold) => ptc.pt() > *threshold,
            Predicate::AbsEtaBelow(threshold) => ptc.p4.eta().abs() < *threshold,
            Predicate::AbsPdgidIn(ids) => ids.contains(&ptc.pdgid.abs()),
            Predicate::Charged => ptc.charge != 0,
            Predicate::RelIsoBelow(threshold) => {
                let iso = ptc.iso.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Particle {} (pdgid {}) has no isolation; run an isolation stage first",
                        ptc.uid,
                        ptc.pdgid
                    )
                })?;
                let pt = ptc.pt();
                pt > 0.0 && iso.all.sumpt / pt < *threshold
            }
        })
    }

    /// Whether evaluating this predicate needs isolation sums.
    pub fn needs_isolation(&self) -> bool {
        match self {
            Predicate::All(preds) | Predicate::Any(preds) => {
                preds.iter().any(Predicate::needs_isolation)
            }
            Predicate::Not(pred) => pred.needs_isolation(),
            Predicate::RelIsoBelow(_) => true,
            _ => false,
        }
    }
}
