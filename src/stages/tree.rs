//! Flat per-event tree written as CSV.

use crate::event::{Event, FieldKind, FieldSpec};
use crate::physics::LorentzVector;
use crate::stages::{Flow, LoopContext, Stage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const KINEMATICS: [&str; 6] = ["e", "pt", "theta", "eta", "phi", "m"];

/// Options for the tree producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeProducerOptions {
    /// Resonance candidates, best first
    pub zeds: String,
    pub jets: String,
    pub recoil: String,

    #[serde(default = "default_file_name")]
    pub file_name: String,
}

fn default_file_name() -> String { "tree.csv".to_string() }

/// Object slots of one row.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Kinematics(&'static str),
    WithPdgid(&'static str),
}

const SLOTS: [Slot; 6] = [
    Slot::Kinematics("zed"),
    Slot::WithPdgid("zed_1"),
    Slot::WithPdgid("zed_2"),
    Slot::Kinematics("jet1"),
    Slot::Kinematics("jet2"),
    Slot::Kinematics("recoil"),
];

fn header() -> Vec<String> {
    let mut columns = vec!["event".to_string()];
    for slot in SLOTS {
        let prefix = match slot {
            Slot::Kinematics(prefix) | Slot::WithPdgid(prefix) => prefix,
        };
        columns.extend(KINEMATICS.iter().map(|var| format!("{}_{}", prefix, var)));
        if matches!(slot, Slot::WithPdgid(_)) {
            columns.push(format!("{}_pdgid", prefix));
        }
    }
    columns
}

fn fill(row: &mut Vec<String>, p4: Option<&LorentzVector>) {
    match p4 {
        Some(p4) => row.extend(
            [p4.e, p4.pt(), p4.theta(), p4.eta(), p4.phi(), p4.m()]
                .iter()
                .map(|value| value.to_string()),
        ),
        None => row.extend(std::iter::repeat_n(String::new(), KINEMATICS.len())),
    }
}

/// Buffers one row per event and writes them at the end of the loop.
pub struct TreeProducer {
    name: String,
    opts: TreeProducerOptions,
    rows: Vec<Vec<String>>,
}

impl TreeProducer {
    pub fn new(name: String, opts: TreeProducerOptions) -> Self {
        Self {
            name,
            opts,
            rows: Vec::new(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl Stage for TreeProducer {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::read(&self.opts.zeds, FieldKind::Resonances),
            FieldSpec::read(&self.opts.jets, FieldKind::Jets),
            FieldSpec::read(&self.opts.recoil, FieldKind::Particle),
        ]
    }

    fn begin_loop(&mut self, _ctx: &LoopContext) -> Result<()> {
        self.rows.clear();
        Ok(())
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        let zed = event.resonances(&self.opts.zeds)?.first();
        let jets = event.jets(&self.opts.jets)?;
        let recoil = event.particle(&self.opts.recoil)?;

        let mut row = vec![event.index.to_string()];
        fill(&mut row, zed.map(|z| &z.p4));
        for i in 0..2 {
            let leg = zed.and_then(|z| z.legs.get(i));
            fill(&mut row, leg.map(|l| &l.p4));
            row.push(leg.map(|l| l.pdgid.to_string()).unwrap_or_default());
        }
        for i in 0..2 {
            fill(&mut row, jets.get(i).map(|j| &j.p4));
        }
        fill(&mut row, Some(&recoil.p4));

        self.rows.push(row);
        Ok(Flow::Continue)
    }

    fn write(&mut self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(&self.opts.file_name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create tree file {}", path.display()))?;
        writer.write_record(header())?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        tracing::info!("{}: wrote {} rows to {}", self.name, self.rows.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FieldValue;
    use crate::io::InputEvent;
    use crate::physics::{Jet, Particle, Resonance};
    use tempfile::TempDir;

    fn options() -> TreeProducerOptions {
        TreeProducerOptions {
            zeds: "zeds".to_string(),
            jets: "jets".to_string(),
            recoil: "recoil".to_string(),
            file_name: default_file_name(),
        }
    }

    fn event(index: usize, with_zed: bool, njets: usize) -> Event {
        let mut event = Event::new(index, InputEvent::default());
        let zeds = if with_zed {
            let legs = vec![
                Particle::new(1, LorentzVector::new(0.0, 30.0, 35.0, 46.1), 13, -1, 1),
                Particle::new(2, LorentzVector::new(0.0, -30.0, -35.0, 46.1), -13, 1, 1),
            ];
            vec![Resonance::new(legs, 23)]
        } else {
            vec![]
        };
        let jets = (0..njets)
            .map(|i| Jet {
                p4: LorentzVector::new(10.0, 0.0, 0.0, 20.0 - i as f64),
                constituents: vec![i as u64 + 3],
            })
            .collect();
        event.set("zeds", FieldValue::Resonances(zeds));
        event.set("jets", FieldValue::Jets(jets));
        event.set(
            "recoil",
            FieldValue::Particle(Particle::composite(LorentzVector::at_rest(240.0))),
        );
        event
    }

    #[test]
    fn test_header_layout() {
        let columns = header();
        assert_eq!(columns[0], "event");
        assert_eq!(columns[1], "zed_e");
        assert!(columns.contains(&"zed_1_pdgid".to_string()));
        assert!(columns.contains(&"recoil_m".to_string()));
        assert_eq!(columns.len(), 1 + 6 * 6 + 2);
    }

    #[test]
    fn test_writes_rows_with_empty_cells() {
        let dir = TempDir::new().unwrap();
        let mut tree = TreeProducer::new("tree".into(), options());
        tree.begin_loop(&LoopContext {
            seed: 0,
            stage_index: 11,
        })
        .unwrap();
        tree.process(&mut event(0, true, 2)).unwrap();
        tree.process(&mut event(1, false, 1)).unwrap();
        assert_eq!(tree.num_rows(), 2);

        tree.write(&dir.path().join("tree")).unwrap();

        let mut reader = csv::Reader::from_path(dir.path().join("tree/tree.csv")).unwrap();
        let headers = reader.headers().unwrap().clone();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);

        let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(&rows[0][column("zed_1_pdgid")], "13");
        assert!(rows[0][column("jet2_e")].parse::<f64>().is_ok());
        assert_eq!(&rows[1][column("zed_e")], "");
        assert_eq!(&rows[1][column("jet2_e")], "");
        assert_eq!(rows[1][column("recoil_m")].parse::<f64>().unwrap(), 240.0);
    }
}
