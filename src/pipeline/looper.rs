//! The run loop over the events of one chunk.

use crate::config::Config;
use crate::event::Event;
use crate::io::EventSource;
use crate::pipeline::{Chunk, Metrics, MetricsReporter};
use crate::stages::{Flow, LoopContext, Sequence};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Drives a stage sequence over the events of one chunk.
pub struct Looper {
    chunk: Chunk,
    sequence: Sequence,
    source: Box<dyn EventSource>,
    metrics: Arc<Metrics>,
    first_event: usize,
    n_events: Option<usize>,
    n_print: usize,
    seed: u64,
    report_every: usize,
}

impl Looper {
    /// Build the sequence and open the chunk's input files.
    pub fn new(config: &Config, chunk: Chunk, metrics: Arc<Metrics>) -> Result<Self> {
        let sequence = Sequence::build(&config.sequence)?;
        let source = config
            .events
            .open(&chunk.files)
            .with_context(|| format!("Failed to open input of {}", chunk.name()))?;

        tracing::debug!(
            "Looper {}: {} stages, {} events available",
            chunk.name(),
            sequence.len(),
            source.len()
        );

        Ok(Self {
            chunk,
            sequence,
            source,
            metrics,
            first_event: config.looper.first_event,
            n_events: config.looper.n_events,
            n_print: config.looper.n_print,
            seed: config.looper.seed,
            report_every: config.looper.report_every,
        })
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Indices of the events `run` will process.
    pub fn event_range(&self) -> std::ops::Range<usize> {
        let available = self.source.len();
        let start = self.first_event.min(available);
        let end = match self.n_events {
            Some(n) => start.saturating_add(n).min(available),
            None => available,
        };
        start..end
    }

    /// Call `begin_loop` on every stage.
    pub fn begin(&mut self) -> Result<()> {
        let seed = self.seed;
        for (stage_index, stage) in self.sequence.stages_mut().iter_mut().enumerate() {
            let ctx = LoopContext { seed, stage_index };
            stage
                .begin_loop(&ctx)
                .with_context(|| format!("stage {}, begin loop", stage.name()))?;
        }
        Ok(())
    }

    /// Call `end_loop` on every stage.
    pub fn end(&mut self) -> Result<()> {
        for stage in self.sequence.stages_mut() {
            stage
                .end_loop()
                .with_context(|| format!("stage {}, end loop", stage.name()))?;
        }
        Ok(())
    }

    /// Run event `iev` through the sequence and return its record.
    pub fn process(&mut self, iev: usize) -> Result<Event> {
        let input = self
            .source
            .event(iev)
            .with_context(|| format!("Failed to read event {} of {}", iev, self.chunk.name()))?;
        let mut event = Event::new(iev, input);

        let mut stopped = false;
        for (index, stage) in self.sequence.stages_mut().iter_mut().enumerate() {
            let start = Instant::now();
            let flow = stage
                .process(&mut event)
                .with_context(|| format!("stage {}, event {}", stage.name(), iev))?;
            stopped = flow == Flow::Stop;
            self.metrics.add_stage_call(index, start.elapsed(), stopped);
            if stopped {
                break;
            }
        }
        self.metrics.add_event_processed(stopped);
        Ok(event)
    }

    /// Process every event of the chunk. Returns the number of events processed.
    pub fn run(&mut self) -> Result<usize> {
        let range = self.event_range();
        tracing::info!(
            "{}: processing events {}..{}",
            self.chunk.name(),
            range.start,
            range.end
        );

        self.begin()?;
        let reporter = MetricsReporter::new(self.metrics.clone(), range.len() as u64);
        let mut processed = 0;
        for iev in range {
            let event = self.process(iev)?;
            if processed < self.n_print {
                println!("{}", event);
            }
            processed += 1;
            if self.report_every > 0 && processed % self.report_every == 0 {
                reporter.report_progress();
            }
        }
        self.end()?;

        Ok(processed)
    }

    /// Each stage writes into `out_dir/<stage name>`.
    pub fn write(&mut self, out_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;
        for stage in self.sequence.stages_mut() {
            let dir = out_dir.join(stage.name());
            stage
                .write(&dir)
                .with_context(|| format!("stage {}, write", stage.name()))?;
        }
        Ok(())
    }
}
