//! Field registry for the per-event record.
//!
//! Every stage declares which fields it reads, writes and updates. Before any
//! event is processed the declarations are walked in sequence order and checked:
//!
//! - a field must be written by an earlier stage before it is read or updated,
//! - readers must agree with the writer on the field kind,
//! - a field is written at most once.

use indexmap::IndexMap;
use serde::Serialize;

/// The type of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Particles,
    Particle,
    Resonances,
    Jets,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldKind::Particles => "particles",
            FieldKind::Particle => "particle",
            FieldKind::Resonances => "resonances",
            FieldKind::Jets => "jets",
        };
        f.write_str(name)
    }
}

/// How a stage touches a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
    /// Read and modified in place
    Update,
}

/// One field access declared by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub access: Access,
}

impl FieldSpec {
    pub fn read(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            access: Access::Read,
        }
    }

    pub fn write(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            access: Access::Write,
        }
    }

    pub fn update(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            access: Access::Update,
        }
    }
}

/// A field known to the schema and the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldEntry {
    pub kind: FieldKind,
    pub producer: String,
}

/// Resolved field registry for a sequence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    fields: IndexMap<String, FieldEntry>,
}

impl Schema {
    /// Walk stage declarations in order and build the registry.
    ///
    /// All violations are collected and reported in one error.
    pub fn check<'a, I>(stages: I) -> anyhow::Result<Schema>
    where
        I: IntoIterator<Item = (&'a str, &'a [FieldSpec])>,
    {
        let mut schema = Schema::default();
        let mut errors = Vec::new();

        for (stage, specs) in stages {
            // Reads are checked against earlier stages only, so a stage cannot
            // read what it writes itself.
            for spec in specs.iter().filter(|s| s.access != Access::Write) {
                match schema.fields.get(&spec.name) {
                    None => errors.push(format!(
                        "stage '{}' reads '{}' which no earlier stage writes",
                        stage, spec.name
                    )),
                    Some(entry) if entry.kind != spec.kind => errors.push(format!(
                        "stage '{}' reads '{}' as {} but stage '{}' writes {}",
                        stage, spec.name, spec.kind, entry.producer, entry.kind
                    )),
                    Some(_) => {}
                }
            }

            for spec in specs.iter().filter(|s| s.access == Access::Write) {
                if let Some(entry) = schema.fields.get(&spec.name) {
                    errors.push(format!(
                        "stage '{}' writes '{}' which stage '{}' already writes",
                        stage, spec.name, entry.producer
                    ));
                    continue;
                }
                schema.fields.insert(
                    spec.name.clone(),
                    FieldEntry {
                        kind: spec.kind,
                        producer: stage.to_string(),
                    },
                );
            }
        }

        if !errors.is_empty() {
            anyhow::bail!("Invalid sequence:\n  {}", errors.join("\n  "));
        }
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in production order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldEntry)> {
        self.fields.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, entry) in &self.fields {
            writeln!(f, "{:<24} {:<12} <- {}", name, entry.kind.to_string(), entry.producer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(stages: &[(&str, Vec<FieldSpec>)]) -> anyhow::Result<Schema> {
        Schema::check(stages.iter().map(|(name, specs)| (*name, specs.as_slice())))
    }

    #[test]
    fn test_valid_chain() {
        let schema = check(&[
            ("source", vec![FieldSpec::write("particles", FieldKind::Particles)]),
            (
                "leptons",
                vec![
                    FieldSpec::read("particles", FieldKind::Particles),
                    FieldSpec::write("leptons", FieldKind::Particles),
                ],
            ),
            ("iso", vec![FieldSpec::update("leptons", FieldKind::Particles)]),
        ])
        .unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("leptons").unwrap().producer, "leptons");
    }

    #[test]
    fn test_read_before_write() {
        let err = check(&[(
            "zeds",
            vec![FieldSpec::read("sel_iso_leptons", FieldKind::Particles)],
        )])
        .unwrap_err()
        .to_string();
        assert!(err.contains("reads 'sel_iso_leptons' which no earlier stage writes"));
    }

    #[test]
    fn test_kind_mismatch() {
        let err = check(&[
            ("recoil", vec![FieldSpec::write("recoil", FieldKind::Particle)]),
            ("tree", vec![FieldSpec::read("recoil", FieldKind::Particles)]),
        ])
        .unwrap_err()
        .to_string();
        assert!(err.contains("as particles but stage 'recoil' writes particle"));
    }

    #[test]
    fn test_duplicate_write() {
        let err = check(&[
            ("a", vec![FieldSpec::write("jets", FieldKind::Jets)]),
            ("b", vec![FieldSpec::write("jets", FieldKind::Jets)]),
        ])
        .unwrap_err()
        .to_string();
        assert!(err.contains("stage 'b' writes 'jets' which stage 'a' already writes"));
    }

    #[test]
    fn test_self_read_rejected() {
        let err = check(&[(
            "loop",
            vec![
                FieldSpec::read("x", FieldKind::Jets),
                FieldSpec::write("x", FieldKind::Jets),
            ],
        )]);
        assert!(err.is_err());
    }

    #[test]
    fn test_all_errors_reported() {
        let err = check(&[(
            "tree",
            vec![
                FieldSpec::read("zeds", FieldKind::Resonances),
                FieldSpec::read("jets", FieldKind::Jets),
            ],
        )])
        .unwrap_err()
        .to_string();
        assert!(err.contains("'zeds'"));
        assert!(err.contains("'jets'"));
    }
}
