//! Event throughput and per-stage timing.

use serde::{Serialize, Serializer};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Counters for one stage of the sequence.
#[derive(Debug, Default)]
pub struct StageMetrics {
    pub name: String,

    /// Events the stage processed
    pub calls: AtomicU64,

    /// Events the stage stopped
    pub stops: AtomicU64,

    /// Time spent in `process` (microseconds)
    pub time_us: AtomicU64,
}

/// Metrics for a run, shared by every chunk.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Events that went through the sequence
    pub events_processed: AtomicU64,

    /// Events stopped before the last stage
    pub events_stopped: AtomicU64,

    /// Number of chunks completed
    pub chunks_processed: AtomicU64,

    /// Number of failed chunks
    pub failures: AtomicU64,

    /// Start time
    start_time: Option<Instant>,

    /// One entry per stage, in sequence order
    stages: Vec<StageMetrics>,
}

impl Metrics {
    /// Create metrics for a sequence with the given stage names.
    pub fn new<S: AsRef<str>>(stage_names: &[S]) -> Arc<Self> {
        Arc::new(Self {
            start_time: Some(Instant::now()),
            stages: stage_names
                .iter()
                .map(|name| StageMetrics {
                    name: name.as_ref().to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        })
    }

    /// Record an event that completed the sequence or was stopped.
    pub fn add_event_processed(&self, stopped: bool) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
        if stopped {
            self.events_stopped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a completed chunk.
    pub fn add_chunk_processed(&self) {
        self.chunks_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failure.
    pub fn add_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one call of stage `index`.
    pub fn add_stage_call(&self, index: usize, duration: Duration, stopped: bool) {
        let Some(stage) = self.stages.get(index) else {
            return;
        };
        stage.calls.fetch_add(1, Ordering::Relaxed);
        stage.time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        if stopped {
            stage.stops.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start_time.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Get events per second.
    pub fn events_per_second(&self) -> f64 {
        let events = self.events_processed.load(Ordering::Relaxed);
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            events as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_stopped: self.events_stopped.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            events_per_second: self.events_per_second(),
            stages: self
                .stages
                .iter()
                .map(|stage| StageSnapshot {
                    name: stage.name.clone(),
                    calls: stage.calls.load(Ordering::Relaxed),
                    stops: stage.stops.load(Ordering::Relaxed),
                    secs: stage.time_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
                })
                .collect(),
        }
    }
}

/// Per-stage part of a [`MetricsSnapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct StageSnapshot {
    pub name: String,
    pub calls: u64,
    pub stops: u64,
    /// Total time in the stage (seconds, summed across chunks)
    pub secs: f64,
}

impl StageSnapshot {
    /// Mean time per call in milliseconds.
    pub fn ms_per_call(&self) -> f64 {
        if self.calls > 0 {
            self.secs * 1000.0 / self.calls as f64
        } else {
            0.0
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub events_processed: u64,
    pub events_stopped: u64,
    pub chunks_processed: u64,
    pub failures: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub events_per_second: f64,
    pub stages: Vec<StageSnapshot>,
}

impl MetricsSnapshot {
    /// Save metrics to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Metrics saved to {}", path.display());
        Ok(())
    }

    /// Total time spent inside stages.
    pub fn stage_secs(&self) -> f64 {
        self.stages.iter().map(|stage| stage.secs).sum()
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Events: {} processed, {} stopped | Chunks: {} | \
             Rate: {:.1} events/s | Failures: {} | Elapsed: {:.1}s",
            self.events_processed,
            self.events_stopped,
            self.chunks_processed,
            self.events_per_second,
            self.failures,
            self.elapsed.as_secs_f64(),
        )
    }
}

/// Progress logging and end-of-run summary.
pub struct MetricsReporter {
    metrics: Arc<Metrics>,
    total_events: u64,
}

impl MetricsReporter {
    /// Create a new metrics reporter.
    pub fn new(metrics: Arc<Metrics>, total_events: u64) -> Self {
        Self {
            metrics,
            total_events,
        }
    }

    /// Log the current progress.
    pub fn report_progress(&self) {
        let snapshot = self.metrics.snapshot();
        let progress = if self.total_events > 0 {
            snapshot.events_processed as f64 / self.total_events as f64 * 100.0
        } else {
            0.0
        };
        tracing::info!("[{:.1}%] {}", progress, snapshot);
    }

    /// Print a final summary, with the per-stage time report if requested.
    pub fn print_summary(&self, time_report: bool) {
        let snapshot = self.metrics.snapshot();

        println!("\n=== Run Summary ===");
        println!("Total time: {:.1}s", snapshot.elapsed.as_secs_f64());
        println!("Chunks processed: {}", snapshot.chunks_processed);
        println!("Events processed: {}", snapshot.events_processed);
        println!("Events stopped: {}", snapshot.events_stopped);
        println!("Processing rate: {:.1} events/s", snapshot.events_per_second);
        println!("Failures: {}", snapshot.failures);

        if time_report {
            print!("{}", TimeReport(&snapshot));
        }
        println!("===================\n");
    }
}

/// Per-stage timing table.
pub struct TimeReport<'a>(pub &'a MetricsSnapshot);

impl std::fmt::Display for TimeReport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.0.stage_secs();
        writeln!(f, "\n--- Stage Time Report ---")?;
        writeln!(
            f,
            "{:<24} {:>9} {:>9} {:>12} {:>8}",
            "stage", "calls", "stops", "ms/call", "%"
        )?;
        for stage in &self.0.stages {
            let pct = if total > 0.0 { stage.secs / total * 100.0 } else { 0.0 };
            writeln!(
                f,
                "{:<24} {:>9} {:>9} {:>12.4} {:>7.1}%",
                stage.name,
                stage.calls,
                stage.stops,
                stage.ms_per_call(),
                pct
            )?;
        }
        writeln!(f, "{:<24} {:>9} {:>9} {:>12} {:>8}", "total", "", "", format!("{:.3}s", total), "")
    }
}
