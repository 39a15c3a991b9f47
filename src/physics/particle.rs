//! Reconstructed objects carried in the per-event record.

use crate::physics::LorentzVector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier reserved for composite objects that do not come from the input.
pub const COMPOSITE_UID: u64 = 0;

/// Isolation sums for one class of particles around an object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Isolation {
    /// Scalar sum of transverse momenta
    pub sumpt: f64,
    /// Scalar sum of energies
    pub sume: f64,
    /// Number of particles in the area
    pub num: usize,
}

impl Isolation {
    pub fn add(&mut self, p4: &LorentzVector) {
        self.sumpt += p4.pt();
        self.sume += p4.e;
        self.num += 1;
    }
}

/// Isolation sums overall and per particle class (by absolute pdgid).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IsolationSet {
    /// All particles
    pub all: Isolation,
    /// Charged hadrons (211)
    pub charged_hadrons: Isolation,
    /// Photons (22)
    pub photons: Isolation,
    /// Neutral hadrons (130)
    pub neutral_hadrons: Isolation,
    /// Electrons (11)
    pub electrons: Isolation,
    /// Muons (13)
    pub muons: Isolation,
}

impl IsolationSet {
    /// Account for one particle inside the isolation area.
    pub fn add(&mut self, pdgid: i32, p4: &LorentzVector) {
        self.all.add(p4);
        let class = match pdgid.abs() {
            211 => Some(&mut self.charged_hadrons),
            22 => Some(&mut self.photons),
            130 => Some(&mut self.neutral_hadrons),
            11 => Some(&mut self.electrons),
            13 => Some(&mut self.muons),
            _ => None,
        };
        if let Some(iso) = class {
            iso.add(p4);
        }
    }
}

/// A particle: generated, simulated or reconstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Per-event identifier, preserved by copies of the particle
    pub uid: u64,
    pub p4: LorentzVector,
    pub pdgid: i32,
    pub charge: i32,
    /// Generator status (1 = stable)
    pub status: i32,
    /// Set by the isolation stage
    #[serde(default)]
    pub iso: Option<IsolationSet>,
}

impl Particle {
    pub fn new(uid: u64, p4: LorentzVector, pdgid: i32, charge: i32, status: i32) -> Self {
        Self {
            uid,
            p4,
            pdgid,
            charge,
            status,
            iso: None,
        }
    }

    /// A composite object such as a recoil system.
    pub fn composite(p4: LorentzVector) -> Self {
        Self::new(COMPOSITE_UID, p4, 0, 0, 0)
    }

    pub fn e(&self) -> f64 {
        self.p4.e
    }

    pub fn pt(&self) -> f64 {
        self.p4.pt()
    }

    pub fn is_stable(&self) -> bool {
        self.status == 1
    }

    pub fn is_neutrino(&self) -> bool {
        matches!(self.pdgid.abs(), 12 | 14 | 16)
    }
}

impl std::fmt::Display for Particle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pdgid = {:5}, {}", self.pdgid, self.p4)?;
        if let Some(iso) = &self.iso {
            write!(f, ", iso = {:.2}", iso.all.sumpt)?;
        }
        Ok(())
    }
}

/// A two-body resonance candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resonance {
    pub p4: LorentzVector,
    pub pdgid: i32,
    pub legs: Vec<Particle>,
}

impl Resonance {
    pub fn new(legs: Vec<Particle>, pdgid: i32) -> Self {
        let p4 = legs.iter().map(|leg| leg.p4).sum();
        Self { p4, pdgid, legs }
    }

    pub fn charge(&self) -> i32 {
        self.legs.iter().map(|leg| leg.charge).sum()
    }

    pub fn m(&self) -> f64 {
        self.p4.m()
    }
}

impl std::fmt::Display for Resonance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pdgid = {:5}, {}, {} legs", self.pdgid, self.p4, self.legs.len())
    }
}

/// A clustered jet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jet {
    pub p4: LorentzVector,
    /// Identifiers of the constituent particles
    pub constituents: Vec<u64>,
}

impl Jet {
    pub fn constituent_set(&self) -> HashSet<u64> {
        self.constituents.iter().copied().collect()
    }
}

impl std::fmt::Display for Jet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {} constituents", self.p4, self.constituents.len())
    }
}

/// Nominal mass in GeV for the resonances the builder knows about.
pub fn nominal_mass(pdgid: i32) -> Option<f64> {
    match pdgid.abs() {
        23 => Some(91.1876),
        24 => Some(80.379),
        25 => Some(125.1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn muon(uid: u64, pz: f64, charge: i32) -> Particle {
        Particle::new(uid, LorentzVector::new(0.0, 0.0, pz, pz.abs()), 13 * -charge, charge, 1)
    }

    #[test]
    fn test_isolation_classes() {
        let mut iso = IsolationSet::default();
        let p4 = LorentzVector::new(3.0, 4.0, 0.0, 5.0);
        iso.add(211, &p4);
        iso.add(-211, &p4);
        iso.add(22, &p4);
        iso.add(2112, &p4);

        assert_eq!(iso.all.num, 4);
        assert_eq!(iso.charged_hadrons.num, 2);
        assert_eq!(iso.photons.num, 1);
        assert_eq!(iso.neutral_hadrons.num, 0);
        assert!((iso.all.sumpt - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_resonance_sums_legs() {
        let z = Resonance::new(vec![muon(1, 45.0, -1), muon(2, -45.0, 1)], 23);
        assert!((z.m() - 90.0).abs() < 1e-9);
        assert_eq!(z.charge(), 0);
    }

    #[test]
    fn test_neutrino_and_stability() {
        let nu = Particle::new(5, LorentzVector::default(), -14, 0, 1);
        assert!(nu.is_neutrino());
        assert!(nu.is_stable());
        assert!(!muon(1, 1.0, 1).is_neutrino());
    }

    #[test]
    fn test_nominal_masses() {
        assert_eq!(nominal_mass(23), Some(91.1876));
        assert_eq!(nominal_mass(-25), Some(125.1));
        assert_eq!(nominal_mass(1), None);
    }
}
