//! Physics objects: four-vectors, particles and selection predicates.

mod collider;
mod lorentz;
mod particle;
mod predicate;

pub use collider::CollisionMode;
pub use lorentz::{delta_phi, LorentzVector};
pub use particle::{nominal_mass, Isolation, IsolationSet, Jet, Particle, Resonance, COMPOSITE_UID};
pub use predicate::Predicate;
