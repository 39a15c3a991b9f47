//! Collider mode and the angular distance it implies.

use crate::physics::{delta_phi, LorentzVector};
use serde::{Deserialize, Serialize};

/// Beam configuration of the analysed events.
///
/// Lepton colliders measure angular distances with the polar angle `theta`,
/// hadron colliders with the pseudorapidity `eta`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionMode {
    #[default]
    Ee,
    Pp,
}

impl CollisionMode {
    /// Angular distance between two directions.
    pub fn delta_r(&self, a: &LorentzVector, b: &LorentzVector) -> f64 {
        match self {
            CollisionMode::Pp => a.delta_r(b),
            CollisionMode::Ee => {
                let dtheta = a.theta() - b.theta();
                let dphi = delta_phi(a.phi(), b.phi());
                (dtheta * dtheta + dphi * dphi).sqrt()
            }
        }
    }
}

impl std::fmt::Display for CollisionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollisionMode::Ee => f.write_str("ee"),
            CollisionMode::Pp => f.write_str("pp"),
        }
    }
}
