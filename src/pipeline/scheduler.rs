//! Distribution of component chunks over loopers.
//!
//! Each chunk gets its own [`Looper`] with freshly built stages. Chunks run
//! one after the other, or on the rayon pool when more than one job is
//! configured.

use crate::config::Config;
use crate::pipeline::{split_component, unique_output_dir, Chunk, Looper, Metrics, MetricsReporter};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of chunks processed concurrently
    pub jobs: usize,

    /// Print the summary and time report at the end
    pub time_report: bool,

    /// Optional path to save metrics JSON after run completes
    pub metrics_output_path: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            time_report: true,
            metrics_output_path: None,
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            jobs: config.looper.jobs.unwrap_or(1),
            time_report: config.looper.time_report,
            metrics_output_path: config.looper.metrics_output_path.clone(),
        }
    }
}

/// Outcome of one chunk.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub name: String,
    pub events: usize,
    pub output_dir: PathBuf,
}

/// Runs every chunk of every component.
pub struct Scheduler {
    config: Arc<Config>,
    metrics: Arc<Metrics>,
    scheduler_config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: Arc<Config>, metrics: Arc<Metrics>, scheduler_config: SchedulerConfig) -> Self {
        Self {
            config,
            metrics,
            scheduler_config,
        }
    }

    /// All chunks, component by component.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.config.components.iter().flat_map(split_component).collect()
    }

    /// Process, write and return the outcome of one chunk.
    fn run_chunk(&self, chunk: Chunk) -> Result<ChunkOutcome> {
        let name = chunk.name();
        let mut looper = Looper::new(&self.config, chunk, self.metrics.clone())?;
        let events = looper.run()?;

        let output_dir = unique_output_dir(&self.config.looper.output_dir.join(&name));
        looper.write(&output_dir)?;
        std::fs::write(output_dir.join("config.yaml"), self.config.to_yaml()?)
            .with_context(|| format!("Failed to write config to {}", output_dir.display()))?;

        self.metrics.add_chunk_processed();
        tracing::info!("{}: {} events, output in {}", name, events, output_dir.display());
        Ok(ChunkOutcome {
            name,
            events,
            output_dir,
        })
    }

    /// Run the scheduler to process all chunks.
    pub fn run(&self) -> Result<RunStats> {
        let chunks = self.chunks();
        let total_chunks = chunks.len();

        tracing::info!(
            "Scheduling {} chunks for processing ({} concurrent)",
            total_chunks,
            self.scheduler_config.jobs
        );

        let results: Vec<Result<ChunkOutcome>> = if self.scheduler_config.jobs > 1 {
            chunks
                .into_par_iter()
                .map(|chunk| self.run_chunk(chunk))
                .collect()
        } else {
            chunks.into_iter().map(|chunk| self.run_chunk(chunk)).collect()
        };

        let mut stats = RunStats {
            total_chunks,
            ..Default::default()
        };
        let mut first_error = None;
        for result in results {
            match result {
                Ok(outcome) => {
                    stats.events_processed += outcome.events;
                    stats.output_dirs.push(outcome.output_dir);
                    stats.chunks_processed += 1;
                }
                Err(e) => {
                    self.metrics.add_failure();
                    stats.chunks_failed += 1;
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        let reporter = MetricsReporter::new(self.metrics.clone(), stats.events_processed as u64);
        reporter.print_summary(self.scheduler_config.time_report);

        if let Some(ref path) = self.scheduler_config.metrics_output_path {
            let snapshot = self.metrics.snapshot();
            if let Err(e) = snapshot.save_to_file(path) {
                tracing::warn!("Failed to save metrics to {}: {}", path.display(), e);
            }
        }

        match first_error {
            Some(e) => Err(e.context(format!("{} of {} chunks failed", stats.chunks_failed, total_chunks))),
            None => Ok(stats),
        }
    }
}

/// Statistics from a run.
#[derive(Debug, Default)]
pub struct RunStats {
    /// Total chunks attempted
    pub total_chunks: usize,

    /// Chunks successfully processed
    pub chunks_processed: usize,

    /// Chunks that failed
    pub chunks_failed: usize,

    /// Events processed over all chunks
    pub events_processed: usize,

    /// One output directory per processed chunk
    pub output_dirs: Vec<PathBuf>,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} processed, {} failed, {} total | Events: {}",
            self.chunks_processed, self.chunks_failed, self.total_chunks, self.events_processed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComponentConfig;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.jobs, 1);
        assert!(config.time_report);
        assert!(config.metrics_output_path.is_none());
    }

    #[test]
    fn test_chunks_over_components() {
        let mut config = Config::ee_zh().unwrap();
        config.components = vec![
            ComponentConfig {
                name: "ZH".to_string(),
                files: vec!["a.jsonl".into(), "b.jsonl".into()],
                split_factor: 2,
            },
            ComponentConfig {
                name: "ZZ".to_string(),
                files: vec!["c.jsonl".into()],
                split_factor: 1,
            },
        ];
        let scheduler_config = SchedulerConfig::from_config(&config);
        let scheduler = Scheduler::new(Arc::new(config), Metrics::new(&["source"]), scheduler_config);

        let names: Vec<String> = scheduler.chunks().iter().map(Chunk::name).collect();
        assert_eq!(names, vec!["ZH_Chunk0", "ZH_Chunk1", "ZZ"]);
    }

    #[test]
    fn test_run_stats_display() {
        let stats = RunStats {
            total_chunks: 4,
            chunks_processed: 3,
            chunks_failed: 1,
            events_processed: 250,
            output_dirs: vec![],
        };

        let display = format!("{}", stats);
        assert!(display.contains("3 processed"));
        assert!(display.contains("1 failed"));
        assert!(display.contains("Events: 250"));
    }
}
