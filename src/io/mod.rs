//! Event input.

mod event_source;

pub use event_source::{EventSource, GenParticleRecord, InputEvent, JsonLinesSource};
