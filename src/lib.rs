// src/lib.rs
//! Wanggan GPS Library
//!
//! Downloads the on-device export of Wanggan handheld GPS receivers over a
//! serial link, parses the record stream and converts it to GPX, KML, CSV
//! or raw text.

pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod gps;
pub mod session;

// Re-export main types for convenience
pub use config::DeviceConfig;
pub use error::{GpsError, Result};
pub use export::{OutputFormat, TrackExporter};
pub use gps::{aggregate, aggregate_bytes, DataBlock, Diagnostics, ParseOutcome};
pub use session::{Capture, ExportSession, SerialTransport, SessionConfig, Transport, TriggerMode};
