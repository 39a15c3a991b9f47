//! Run configuration: input components, the stage sequence and looper options.

use crate::io::{EventSource, JsonLinesSource};
use crate::stages::StageConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::with::singleton_map_recursive;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Main configuration for an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input datasets
    pub components: Vec<ComponentConfig>,

    /// Stages, in execution order
    pub sequence: Vec<StageConfig>,

    /// Event input format
    #[serde(default)]
    pub events: EventsConfig,

    /// Run loop options
    #[serde(default)]
    pub looper: LooperConfig,
}

/// A named group of input files treated as one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,

    pub files: Vec<PathBuf>,

    /// Number of chunks the files are split into
    #[serde(default = "default_split_factor")]
    pub split_factor: usize,
}

/// Supported event input formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFormat {
    /// One JSON object per line
    #[default]
    Jsonl,
}

/// Event-record factory options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default)]
    pub format: EventFormat,
}

impl EventsConfig {
    /// Open the files of one chunk as an event source.
    pub fn open(&self, files: &[PathBuf]) -> anyhow::Result<Box<dyn EventSource>> {
        match self.format {
            EventFormat::Jsonl => Ok(Box::new(JsonLinesSource::open(files)?)),
        }
    }
}

/// Run loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LooperConfig {
    /// Directory receiving one subdirectory per chunk
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum number of events per chunk (all events when unset)
    #[serde(default)]
    pub n_events: Option<usize>,

    /// Index of the first event to process in each chunk
    #[serde(default)]
    pub first_event: usize,

    /// Number of event records printed at the start of each chunk
    #[serde(default = "default_n_print")]
    pub n_print: usize,

    /// Print the per-stage time report at the end of the run
    #[serde(default = "default_true")]
    pub time_report: bool,

    /// Seed for stage random number generators
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of chunks processed in parallel (sequential when unset or 1)
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Log progress every N events (0 disables)
    #[serde(default = "default_report_every")]
    pub report_every: usize,

    /// Optional path to save metrics JSON after the run completes
    #[serde(default)]
    pub metrics_output_path: Option<PathBuf>,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            n_events: None,
            first_event: 0,
            n_print: default_n_print(),
            time_report: default_true(),
            seed: default_seed(),
            jobs: None,
            report_every: default_report_every(),
            metrics_output_path: None,
        }
    }
}

/// Parse YAML where enum variants are written as single-key maps
/// (`filter_func: {energy_above: 10.0}`) or plain strings for unit variants.
pub fn parse_yaml<T: DeserializeOwned>(yaml: &str) -> anyhow::Result<T> {
    Ok(singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(yaml))?)
}

/// Built-in ee -> ZH -> mumubb analysis.
pub const EE_ZH_TEMPLATE: &str = r#"# heppipe configuration: ee -> ZH -> mumubb analysis

# === COMPONENTS: input datasets ===
components:
  - name: ee_ZH_Z_Hbb
    files:
      - "ee_ZH_Z_Hbb.jsonl"
    # Number of chunks the files are split into (at most one per file)
    split_factor: 1

# === SEQUENCE: stages run in this order, once per event ===
sequence:
  # Read generated particles and assign per-event identifiers
  - name: source
    stage:
      reader:
        mode: ee
        gen_particles: GenParticle

  # Fast detector simulation
  - name: papas
    stage:
      simulation:
        detector:
          name: CMS
        gen_particles: gen_particles_stable
        sim_particles: sim_particles
        rec_particles: particles
        display: false
        verbose: true

  # Leptons with e > 10
  - name: sel_leptons
    stage:
      filter:
        input_objects: particles
        output: leptons_true
        filter_func:
          all:
            - energy_above: 10.0
            - abs_pdgid_in: [11, 13]

  - name: leptons
    stage:
      lepton_smearer:
        input_objects: leptons_true
        output: leptons
        # Gaussian relative energy resolution and per-lepton efficiency
        energy_resolution: 0.01
        efficiency: 0.95

  # Isolation in a cone of 0.4 around each lepton
  - name: iso_leptons
    stage:
      isolation:
        leptons: leptons
        particles: particles
        iso_area:
          eta_phi_circle: 0.4

  # Relative isolation below 0.3
  - name: sel_iso_leptons
    stage:
      filter:
        input_objects: leptons
        output: sel_iso_leptons
        filter_func:
          rel_iso_below: 0.3

  - name: zed_builder
    stage:
      resonance_builder:
        output: zeds
        leg_collection: sel_iso_leptons
        pdgid: 23

  # Recoil against the best Z candidate
  - name: recoil
    stage:
      recoil_builder:
        output: recoil
        sqrts: 240.0
        to_remove: zeds_legs

  - name: particles_not_zed
    stage:
      masker:
        output: particles_not_zed
        input: particles
        mask: zeds_legs

  # Exclusive clustering into 2 jets
  - name: jets
    stage:
      jet_clusterizer:
        particles: particles_not_zed
        output: jets
        jet_definition:
          njets: 2

  - name: selection
    stage:
      selection:
        leptons: sel_iso_leptons
        # Skip the remaining stages for events failing a cut
        stop_on_fail: false

  - name: tree
    stage:
      tree_producer:
        zeds: zeds
        jets: jets
        recoil: recoil

# === EVENTS: input format ===
events:
  format: jsonl

# === LOOPER: run options ===
looper:
  output_dir: "Output"
  n_events: 100
  n_print: 1
  time_report: true
  seed: 3735928559  # 0xdeadbeef
  report_every: 1000
  # jobs: 4
  # metrics_output_path: "metrics.json"
"#;

impl Config {
    /// Load configuration from a YAML or JSON file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        match extension.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        parse_yaml(yaml)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize configuration to YAML, enums written as single-key maps.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        let mut serializer = serde_yaml::Serializer::new(Vec::new());
        singleton_map_recursive::serialize(self, &mut serializer)?;
        Ok(String::from_utf8(serializer.into_inner()?)?)
    }

    /// The built-in ee -> ZH -> mumubb analysis.
    pub fn ee_zh() -> anyhow::Result<Self> {
        Self::from_yaml(EE_ZH_TEMPLATE)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.components.is_empty() {
            anyhow::bail!("At least one component is required");
        }
        let mut component_names = HashSet::new();
        for component in &self.components {
            if !component_names.insert(component.name.as_str()) {
                anyhow::bail!("Duplicate component name '{}'", component.name);
            }
            if component.files.is_empty() {
                anyhow::bail!("Component '{}' has no files", component.name);
            }
            if component.split_factor == 0 || component.split_factor > component.files.len() {
                anyhow::bail!(
                    "Component '{}': split_factor must be in 1..={}, got {}",
                    component.name,
                    component.files.len(),
                    component.split_factor
                );
            }
        }

        if self.sequence.is_empty() {
            anyhow::bail!("Sequence must contain at least one stage");
        }
        let mut stage_names = HashSet::new();
        for stage in &self.sequence {
            if !stage_names.insert(stage.name.as_str()) {
                anyhow::bail!("Duplicate stage name '{}'", stage.name);
            }
            stage
                .stage
                .validate()
                .map_err(|e| anyhow::anyhow!("Stage '{}': {}", stage.name, e))?;
        }

        if self.looper.jobs == Some(0) {
            anyhow::bail!("jobs must be > 0");
        }
        Ok(())
    }
}

fn default_split_factor() -> usize { 1 }
fn default_output_dir() -> PathBuf { PathBuf::from("Output") }
fn default_n_print() -> usize { 1 }
fn default_true() -> bool { true }
fn default_seed() -> u64 { 0xdeadbeef }
fn default_report_every() -> usize { 1000 }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{CollisionMode, Predicate};
    use crate::stages::{IsoArea, StageKind};

    fn stage<'a>(config: &'a Config, name: &str) -> &'a StageKind {
        &config
            .sequence
            .iter()
            .find(|s| s.name == name)
            .unwrap()
            .stage
    }

    #[test]
    fn test_template_parses_and_validates() {
        let config = Config::ee_zh().unwrap();
        config.validate().unwrap();
        assert_eq!(config.components.len(), 1);
        assert_eq!(config.events.format, EventFormat::Jsonl);
    }

    #[test]
    fn test_template_stage_order() {
        let config = Config::ee_zh().unwrap();
        let names: Vec<&str> = config.sequence.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "source",
                "papas",
                "sel_leptons",
                "leptons",
                "iso_leptons",
                "sel_iso_leptons",
                "zed_builder",
                "recoil",
                "particles_not_zed",
                "jets",
                "selection",
                "tree",
            ]
        );
    }

    #[test]
    fn test_template_literal_values() {
        let config = Config::ee_zh().unwrap();

        match stage(&config, "source") {
            StageKind::Reader(opts) => {
                assert_eq!(opts.mode, CollisionMode::Ee);
                assert_eq!(opts.gen_particles, "GenParticle");
            }
            other => panic!("unexpected stage {:?}", other),
        }
        match stage(&config, "papas") {
            StageKind::Simulation(opts) => {
                assert_eq!(opts.detector.name, "CMS");
                assert_eq!(opts.rec_particles, "particles");
                assert!(opts.verbose);
                assert!(!opts.display);
            }
            other => panic!("unexpected stage {:?}", other),
        }
        match stage(&config, "leptons") {
            StageKind::LeptonSmearer(opts) => {
                assert_eq!(opts.energy_resolution, 0.01);
                assert_eq!(opts.efficiency, 0.95);
            }
            other => panic!("unexpected stage {:?}", other),
        }
        match stage(&config, "sel_leptons") {
            StageKind::Filter(opts) => assert_eq!(
                opts.filter_func,
                Predicate::All(vec![
                    Predicate::EnergyAbove(10.0),
                    Predicate::AbsPdgidIn(vec![11, 13]),
                ])
            ),
            other => panic!("unexpected stage {:?}", other),
        }
        match stage(&config, "iso_leptons") {
            StageKind::Isolation(opts) => {
                assert_eq!(opts.iso_area, IsoArea::EtaPhiCircle(0.4));
            }
            other => panic!("unexpected stage {:?}", other),
        }
        match stage(&config, "sel_iso_leptons") {
            StageKind::Filter(opts) => assert_eq!(opts.filter_func, Predicate::RelIsoBelow(0.3)),
            other => panic!("unexpected stage {:?}", other),
        }
        match stage(&config, "zed_builder") {
            StageKind::ResonanceBuilder(opts) => {
                assert_eq!(opts.pdgid, 23);
                assert_eq!(opts.leg_collection, "sel_iso_leptons");
            }
            other => panic!("unexpected stage {:?}", other),
        }
        match stage(&config, "recoil") {
            StageKind::RecoilBuilder(opts) => {
                assert_eq!(opts.sqrts, 240.0);
                assert_eq!(opts.to_remove, "zeds_legs");
            }
            other => panic!("unexpected stage {:?}", other),
        }
        match stage(&config, "jets") {
            StageKind::JetClusterizer(opts) => {
                assert_eq!(opts.jet_definition.njets, Some(2));
                assert_eq!(opts.particles, "particles_not_zed");
            }
            other => panic!("unexpected stage {:?}", other),
        }
        match stage(&config, "selection") {
            StageKind::Selection(opts) => assert!(!opts.stop_on_fail),
            other => panic!("unexpected stage {:?}", other),
        }
    }

    #[test]
    fn test_template_looper_values() {
        let config = Config::ee_zh().unwrap();
        assert_eq!(config.looper.n_events, Some(100));
        assert_eq!(config.looper.n_print, 1);
        assert!(config.looper.time_report);
        assert_eq!(config.looper.seed, 0xdeadbeef);
        assert_eq!(config.looper.output_dir, PathBuf::from("Output"));
    }

    #[test]
    fn test_yaml_round_trip_preserves_sequence() {
        let config = Config::ee_zh().unwrap();
        let reparsed = Config::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(reparsed.sequence, config.sequence);
        assert_eq!(reparsed.looper, config.looper);
    }

    #[test]
    fn test_yaml_round_trip_nested_predicates() {
        let mut config = Config::ee_zh().unwrap();
        if let StageKind::Filter(opts) = &mut config.sequence[2].stage {
            opts.filter_func = Predicate::Not(Box::new(Predicate::All(vec![
                Predicate::Charged,
                Predicate::EnergyAbove(5.0),
            ])));
        }

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("not:"), "{}", yaml);
        assert!(yaml.contains("energy_above:"), "{}", yaml);
        let reparsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(reparsed.sequence, config.sequence);
    }

    #[test]
    fn test_single_key_map_enums() {
        let yaml = r#"
components:
  - name: ZH
    files: [a.jsonl]
sequence:
  - name: source
    stage:
      reader:
        mode: pp
  - name: neutral
    stage:
      filter:
        input_objects: gen_particles
        output: neutral
        filter_func:
          not:
            any:
              - charged
              - abs_pdgid_in: [12, 14, 16]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        match &config.sequence[1].stage {
            StageKind::Filter(opts) => assert_eq!(
                opts.filter_func,
                Predicate::Not(Box::new(Predicate::Any(vec![
                    Predicate::Charged,
                    Predicate::AbsPdgidIn(vec![12, 14, 16]),
                ])))
            ),
            other => panic!("unexpected stage {:?}", other),
        }
        match &config.sequence[0].stage {
            StageKind::Reader(opts) => assert_eq!(opts.mode, CollisionMode::Pp),
            other => panic!("unexpected stage {:?}", other),
        }
    }

    #[test]
    fn test_json_config() {
        let json = r#"{
            "components": [{"name": "ZH", "files": ["a.jsonl", "b.jsonl"], "split_factor": 2}],
            "sequence": [{"name": "source", "stage": {"reader": {}}}]
        }"#;
        let config = Config::from_json(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.looper, LooperConfig::default());
        assert_eq!(config.components[0].split_factor, 2);
    }

    #[test]
    fn test_config_validation_invalid() {
        let base = Config::ee_zh().unwrap();

        let mut config = base.clone();
        config.components[0].split_factor = 2;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.components[0].files.clear();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.components.push(config.components[0].clone());
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.sequence.push(config.sequence[0].clone());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate stage name 'source'"));

        let mut config = base.clone();
        config.sequence.clear();
        assert!(config.validate().is_err());

        let mut config = base;
        for s in &mut config.sequence {
            if let StageKind::RecoilBuilder(opts) = &mut s.stage {
                opts.sqrts = 0.0;
            }
        }
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Stage 'recoil'"));
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("analysis.yml");
        std::fs::write(&path, EE_ZH_TEMPLATE).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.sequence.len(), 12);
    }
}
