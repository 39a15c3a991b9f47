//! Cut-flow counters.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// Ordered list of labelled counts, one per selection step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Counter {
    pub name: String,
    entries: IndexMap<String, u64>,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: IndexMap::new(),
        }
    }

    /// Add a step. Registering an existing label is a no-op.
    pub fn register(&mut self, label: impl Into<String>) {
        self.entries.entry(label.into()).or_insert(0);
    }

    pub fn inc(&mut self, label: &str) -> Result<()> {
        let count = self
            .entries
            .get_mut(label)
            .ok_or_else(|| anyhow::anyhow!("Counter '{}' has no step '{}'", self.name, label))?;
        *count += 1;
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.entries.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(label, count)| (label.as_str(), *count))
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_string())
            .with_context(|| format!("Failed to write counter to {}", path.display()))
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Counter {} :", self.name)?;
        let first = self.entries.values().next().copied().unwrap_or(0);
        let mut previous = first;
        for (label, &count) in &self.entries {
            let eff_previous = if previous > 0 { count as f64 / previous as f64 } else { 0.0 };
            let eff_first = if first > 0 { count as f64 / first as f64 } else { 0.0 };
            writeln!(
                f,
                "\t {:<40} {:>9} \t {:4.2} \t {:6.4}",
                label, count, eff_previous, eff_first
            )?;
            previous = count;
        }
        Ok(())
    }
}
