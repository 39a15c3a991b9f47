//! Four-momentum arithmetic.
//!
//! ## Conventions
//!
//! - Components are `(px, py, pz, e)` in GeV, natural units.
//! - `theta` is the polar angle from the +z (beam) axis, `phi` the azimuth.
//! - `eta` is the pseudorapidity `-ln(tan(theta / 2))`.
//! - Angular distance `delta_r` uses `(eta, phi)` with `phi` wrapped to `[-pi, pi]`.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// A Lorentz four-vector `(px, py, pz, e)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LorentzVector {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

impl LorentzVector {
    pub const fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Four-vector of a system at rest with total energy `sqrts`.
    pub const fn at_rest(sqrts: f64) -> Self {
        Self::new(0.0, 0.0, 0.0, sqrts)
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Magnitude of the three-momentum.
    pub fn p(&self) -> f64 {
        (self.px * self.px + self.py * self.py + self.pz * self.pz).sqrt()
    }

    /// Invariant mass squared.
    pub fn m2(&self) -> f64 {
        let p = self.p();
        self.e * self.e - p * p
    }

    /// Invariant mass. Space-like vectors get a negative mass, as in ROOT.
    pub fn m(&self) -> f64 {
        let m2 = self.m2();
        if m2 >= 0.0 {
            m2.sqrt()
        } else {
            -(-m2).sqrt()
        }
    }

    pub fn phi(&self) -> f64 {
        if self.px == 0.0 && self.py == 0.0 {
            0.0
        } else {
            self.py.atan2(self.px)
        }
    }

    pub fn theta(&self) -> f64 {
        if self.pt() == 0.0 && self.pz == 0.0 {
            0.0
        } else {
            self.pt().atan2(self.pz)
        }
    }

    /// Pseudorapidity. Infinite along the beam axis.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt == 0.0 {
            return match self.pz {
                z if z > 0.0 => f64::INFINITY,
                z if z < 0.0 => f64::NEG_INFINITY,
                _ => 0.0,
            };
        }
        (self.pz / pt).asinh()
    }

    /// Cosine of the opening angle between the two three-momenta.
    pub fn cos_angle(&self, other: &LorentzVector) -> f64 {
        let norm = self.p() * other.p();
        if norm == 0.0 {
            return 1.0;
        }
        let dot = self.px * other.px + self.py * other.py + self.pz * other.pz;
        (dot / norm).clamp(-1.0, 1.0)
    }

    /// Distance in the (eta, phi) plane.
    pub fn delta_r(&self, other: &LorentzVector) -> f64 {
        let deta = self.eta() - other.eta();
        let dphi = delta_phi(self.phi(), other.phi());
        (deta * deta + dphi * dphi).sqrt()
    }

    /// Scale all four components by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.px * factor,
            self.py * factor,
            self.pz * factor,
            self.e * factor,
        )
    }
}

/// Azimuthal difference wrapped to `[-pi, pi]`.
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    let mut dphi = phi1 - phi2;
    while dphi > PI {
        dphi -= 2.0 * PI;
    }
    while dphi < -PI {
        dphi += 2.0 * PI;
    }
    dphi
}

impl Add for LorentzVector {
    type Output = LorentzVector;

    fn add(self, rhs: Self) -> Self::Output {
        LorentzVector::new(
            self.px + rhs.px,
            self.py + rhs.py,
            self.pz + rhs.pz,
            self.e + rhs.e,
        )
    }
}

impl AddAssign for LorentzVector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for LorentzVector {
    type Output = LorentzVector;

    fn sub(self, rhs: Self) -> Self::Output {
        LorentzVector::new(
            self.px - rhs.px,
            self.py - rhs.py,
            self.pz - rhs.pz,
            self.e - rhs.e,
        )
    }
}

impl Sum for LorentzVector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(LorentzVector::default(), |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a LorentzVector> for LorentzVector {
    fn sum<I: Iterator<Item = &'a LorentzVector>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl std::fmt::Display for LorentzVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "e = {:7.2}, pt = {:7.2}, theta = {:5.2}, phi = {:5.2}, m = {:7.2}",
            self.e,
            self.pt(),
            self.theta(),
            self.phi(),
            self.m()
        )
    }
}
