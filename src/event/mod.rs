//! Per-event record and the field schema checked against stage declarations.

mod record;
mod schema;

pub use record::{Event, FieldValue};
pub use schema::{Access, FieldEntry, FieldKind, FieldSpec, Schema};
