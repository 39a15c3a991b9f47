//! Event selection bookkeeping for the ZH analysis.

use crate::event::{Event, FieldKind, FieldSpec};
use crate::pipeline::Counter;
use crate::stages::{Flow, LoopContext, Stage};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ALL_EVENTS: &str = "All events";
const TWO_LEPTONS: &str = "At least 2 leptons";

/// Options for the selection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOptions {
    /// Selected lepton collection; the second entry in input order is cut on
    #[serde(default = "default_leptons")]
    pub leptons: String,

    /// Energy threshold applied to the second lepton
    #[serde(default = "default_min_second_lepton_energy")]
    pub min_second_lepton_energy: f64,

    /// Skip the remaining stages for events failing a cut
    #[serde(default)]
    pub stop_on_fail: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            leptons: default_leptons(),
            min_second_lepton_energy: default_min_second_lepton_energy(),
            stop_on_fail: false,
        }
    }
}

fn default_leptons() -> String { "sel_iso_leptons".to_string() }
fn default_min_second_lepton_energy() -> f64 { 30.0 }

/// Fills the `cut_flow` counter. Failing events continue through the
/// sequence unless `stop_on_fail` is set.
pub struct Selection {
    name: String,
    opts: SelectionOptions,
    energy_step: String,
    counter: Counter,
}

impl Selection {
    pub fn new(name: String, opts: SelectionOptions) -> Self {
        let energy_step = format!("Both leptons e>{}", opts.min_second_lepton_energy);
        Self {
            name,
            opts,
            energy_step,
            counter: Counter::new("cut_flow"),
        }
    }

    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    fn failed(&self) -> Flow {
        if self.opts.stop_on_fail {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}

impl Stage for Selection {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::read(&self.opts.leptons, FieldKind::Particles)]
    }

    fn begin_loop(&mut self, _ctx: &LoopContext) -> Result<()> {
        self.counter = Counter::new("cut_flow");
        self.counter.register(ALL_EVENTS);
        self.counter.register(TWO_LEPTONS);
        self.counter.register(self.energy_step.clone());
        Ok(())
    }

    fn process(&mut self, event: &mut Event) -> Result<Flow> {
        self.counter.inc(ALL_EVENTS)?;
        let leptons = event.particles(&self.opts.leptons)?;
        if leptons.len() < 2 {
            return Ok(self.failed());
        }
        self.counter.inc(TWO_LEPTONS)?;
        if leptons[1].e() < self.opts.min_second_lepton_energy {
            return Ok(self.failed());
        }
        self.counter.inc(&self.energy_step)?;
        Ok(Flow::Continue)
    }

    fn end_loop(&mut self) -> Result<()> {
        tracing::info!("{}: {}", self.name, self.counter);
        Ok(())
    }

    fn write(&mut self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        self.counter.write_to(&dir.join("cut_flow.txt"))
    }
}
