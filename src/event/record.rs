//! The per-event record threaded through the stage sequence.

use crate::event::FieldKind;
use crate::io::InputEvent;
use crate::physics::{CollisionMode, Jet, Particle, Resonance};
use anyhow::Result;
use indexmap::IndexMap;

/// A typed value stored under a field name.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Particles(Vec<Particle>),
    Particle(Particle),
    Resonances(Vec<Resonance>),
    Jets(Vec<Jet>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Particles(_) => FieldKind::Particles,
            FieldValue::Particle(_) => FieldKind::Particle,
            FieldValue::Resonances(_) => FieldKind::Resonances,
            FieldValue::Jets(_) => FieldKind::Jets,
        }
    }
}

/// Per-event record.
///
/// Holds the raw input collections read from the event source and the typed
/// fields produced by the stages, in the order they were produced.
#[derive(Debug, Clone)]
pub struct Event {
    /// Index of the event within its chunk
    pub index: usize,
    /// Beam configuration, set by the reader stage
    pub mode: CollisionMode,
    input: InputEvent,
    fields: IndexMap<String, FieldValue>,
}

impl Event {
    pub fn new(index: usize, input: InputEvent) -> Self {
        Self {
            index,
            mode: CollisionMode::default(),
            input,
            fields: IndexMap::new(),
        }
    }

    /// Raw input collections.
    pub fn input(&self) -> &InputEvent {
        &self.input
    }

    /// Store a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in production order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    fn lookup(&self, name: &str) -> Result<&FieldValue> {
        self.fields
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Event {} has no field '{}'", self.index, name))
    }

    fn mismatch(name: &str, found: &FieldValue, expected: FieldKind) -> anyhow::Error {
        anyhow::anyhow!(
            "Field '{}' holds {}, expected {}",
            name,
            found.kind(),
            expected
        )
    }

    pub fn particles(&self, name: &str) -> Result<&[Particle]> {
        match self.lookup(name)? {
            FieldValue::Particles(ptcs) => Ok(ptcs),
            other => Err(Self::mismatch(name, other, FieldKind::Particles)),
        }
    }

    pub fn particle(&self, name: &str) -> Result<&Particle> {
        match self.lookup(name)? {
            FieldValue::Particle(ptc) => Ok(ptc),
            other => Err(Self::mismatch(name, other, FieldKind::Particle)),
        }
    }

    pub fn resonances(&self, name: &str) -> Result<&[Resonance]> {
        match self.lookup(name)? {
            FieldValue::Resonances(res) => Ok(res),
            other => Err(Self::mismatch(name, other, FieldKind::Resonances)),
        }
    }

    pub fn jets(&self, name: &str) -> Result<&[Jet]> {
        match self.lookup(name)? {
            FieldValue::Jets(jets) => Ok(jets),
            other => Err(Self::mismatch(name, other, FieldKind::Jets)),
        }
    }

    /// Mutable access to a particle collection, for stages that update in place.
    pub fn particles_mut(&mut self, name: &str) -> Result<&mut Vec<Particle>> {
        let index = self.index;
        match self.fields.get_mut(name) {
            Some(FieldValue::Particles(ptcs)) => Ok(ptcs),
            Some(other) => Err(Self::mismatch(name, other, FieldKind::Particles)),
            None => anyhow::bail!("Event {} has no field '{}'", index, name),
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Event {}", self.index)?;
        for (name, value) in &self.fields {
            match value {
                FieldValue::Particles(ptcs) => {
                    writeln!(f, "  {} ({} particles)", name, ptcs.len())?;
                    for ptc in ptcs {
                        writeln!(f, "    {}", ptc)?;
                    }
                }
                FieldValue::Particle(ptc) => writeln!(f, "  {}: {}", name, ptc)?,
                FieldValue::Resonances(res) => {
                    writeln!(f, "  {} ({} resonances)", name, res.len())?;
                    for r in res {
                        writeln!(f, "    {}", r)?;
                    }
                }
                FieldValue::Jets(jets) => {
                    writeln!(f, "  {} ({} jets)", name, jets.len())?;
                    for jet in jets {
                        writeln!(f, "    {}", jet)?;
                    }
                }
            }
        }
        Ok(())
    }
}
