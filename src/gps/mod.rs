// src/gps/mod.rs
//! Record protocol of the Tilde export: codec, classifier and aggregator

pub mod aggregate;
pub mod classify;
pub mod coord;
pub mod record;

pub use aggregate::{aggregate, aggregate_bytes, Diagnostics, ParseOutcome};
pub use classify::{classify_line, LineKind, Unrecognized};
pub use record::{CoordinatePoint, DataBlock, HeaderField, RecordHeader, RecordKind};
