//! Run orchestration: chunking, the event loop and metrics.

mod component;
mod counters;
mod looper;
mod metrics;
mod scheduler;


pub use component::{split_component, unique_output_dir, Chunk};
pub use counters::Counter;
pub use looper::Looper;
pub use metrics::{Metrics, MetricsReporter, MetricsSnapshot, StageMetrics, StageSnapshot, TimeReport};
pub use scheduler::{ChunkOutcome, RunStats, Scheduler, SchedulerConfig};
