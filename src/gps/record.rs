// src/gps/record.rs
//! Typed records decoded from the device export

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use super::coord::scaled_to_degrees;

/// Kind of a data block, fixed by the ordered letter pair of its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordKind {
    Track,
    Area,
    Distance,
    Waypoint,
}

impl RecordKind {
    /// Map the two field letters of a header, in order, to a kind.
    pub fn from_letters(first: char, second: char) -> Option<Self> {
        match (first, second) {
            ('k', 'l') => Some(RecordKind::Track),
            ('m', 'l') => Some(RecordKind::Area),
            ('l', 'm') => Some(RecordKind::Distance),
            ('p', 'p') => Some(RecordKind::Waypoint),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecordKind::Track => "Track",
            RecordKind::Area => "Area",
            RecordKind::Distance => "Distance",
            RecordKind::Waypoint => "Waypoint",
        }
    }

    /// Interpret the raw header payloads according to this kind.
    ///
    /// Only fields known to be angles are scaled; the Track `k` field and
    /// both Waypoint `p` fields stay opaque.
    pub fn interpret_fields(&self, a: i64, b: i64) -> (HeaderField, HeaderField) {
        match self {
            RecordKind::Track => (HeaderField::Opaque(a), HeaderField::Longitude(scaled_to_degrees(b))),
            RecordKind::Area => (
                HeaderField::Latitude(scaled_to_degrees(a)),
                HeaderField::Longitude(scaled_to_degrees(b)),
            ),
            RecordKind::Distance => (
                HeaderField::Longitude(scaled_to_degrees(a)),
                HeaderField::Latitude(scaled_to_degrees(b)),
            ),
            RecordKind::Waypoint => (HeaderField::Opaque(a), HeaderField::Opaque(b)),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the two payload fields of a header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum HeaderField {
    Latitude(f64),
    Longitude(f64),
    /// Meaning not established; the raw scaled integer as transmitted.
    Opaque(i64),
}

impl HeaderField {
    /// Decimal degrees, if this field is a known angle.
    pub fn degrees(&self) -> Option<f64> {
        match self {
            HeaderField::Latitude(v) | HeaderField::Longitude(v) => Some(*v),
            HeaderField::Opaque(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordHeader {
    pub sequence_number: u64,
    pub kind: RecordKind,
    pub field_a: HeaderField,
    pub field_b: HeaderField,
    /// Device local time, minute resolution.
    pub timestamp: NaiveDateTime,
    /// Declared number of points; advisory only.
    pub total_count: u64,
}

impl RecordHeader {
    pub fn latitude(&self) -> Option<f64> {
        [self.field_a, self.field_b].into_iter().find_map(|f| match f {
            HeaderField::Latitude(v) => Some(v),
            _ => None,
        })
    }

    pub fn longitude(&self) -> Option<f64> {
        [self.field_a, self.field_b].into_iter().find_map(|f| match f {
            HeaderField::Longitude(v) => Some(v),
            _ => None,
        })
    }

    /// Human readable label such as `Area 14`.
    pub fn label(&self) -> String {
        format!("{} {}", self.kind, self.sequence_number)
    }
}

/// A decoded coordinate line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoordinatePoint {
    pub longitude: f64,
    pub latitude: f64,
    /// Meters.
    pub altitude: i32,
}

/// A header and the points that followed it, in transmission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataBlock {
    header: RecordHeader,
    points: Vec<CoordinatePoint>,
}

impl DataBlock {
    pub fn new(header: RecordHeader, points: Vec<CoordinatePoint>) -> Self {
        Self { header, points }
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    pub fn points(&self) -> &[CoordinatePoint] {
        &self.points
    }

    pub fn kind(&self) -> RecordKind {
        self.header.kind
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn count_matches_declared(&self) -> bool {
        self.points.len() as u64 == self.header.total_count
    }
}
