// src/gps/classify.rs
//! Line classification for the Tilde export format
//!
//! The export is line oriented. A header looks like
//! `n0014,m0000019335,l0000006404;t202510241534,N0004`, a point like
//! `-008d35'22.330",+41d06'50.109",01796;` and a lone `!` ends a record.
//! Each shape has its own check so it can be exercised on its own.

use chrono::{NaiveDate, NaiveDateTime};

use super::coord::{parse_scaled_integer, sexagesimal_to_decimal};
use super::record::{CoordinatePoint, RecordHeader, RecordKind};
use crate::error::Result;

const SEPARATOR: &str = "!";
const MIN_SEQUENCE_DIGITS: usize = 4;
const MIN_FIELD_DIGITS: usize = 10;
const TIMESTAMP_DIGITS: usize = 12;
const MIN_COUNT_DIGITS: usize = 4;

/// What a single line of the export turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Header(RecordHeader),
    Point(CoordinatePoint),
    Separator,
    Blank,
    Unrecognized(Unrecognized),
}

/// Why a line could not be used.
#[derive(Debug, Clone, PartialEq)]
pub enum Unrecognized {
    /// Header shaped, but the letter pair names no known record kind.
    UnknownHeaderKind { first: char, second: char },
    /// Point shaped, but a coordinate token did not decode.
    BadCoordinate(String),
    /// Matches no known shape.
    Garbled,
}

/// Classify one line. Surrounding whitespace (including `\r`) is ignored.
pub fn classify_line(line: &str) -> LineKind {
    let line = line.trim();

    if let Some(shape) = header_shape(line) {
        return match shape.into_header() {
            Ok(header) => LineKind::Header(header),
            Err(reason) => LineKind::Unrecognized(reason),
        };
    }

    match parse_coordinate_line(line) {
        Ok(Some(point)) => return LineKind::Point(point),
        Ok(None) => {}
        Err(e) => return LineKind::Unrecognized(Unrecognized::BadCoordinate(e.to_string())),
    }

    if is_separator(line) {
        LineKind::Separator
    } else if line.is_empty() {
        LineKind::Blank
    } else {
        LineKind::Unrecognized(Unrecognized::Garbled)
    }
}

pub fn is_separator(line: &str) -> bool {
    line.trim() == SEPARATOR
}

/// Parse a header line of a known kind.
pub fn parse_header(line: &str) -> Option<RecordHeader> {
    header_shape(line.trim())?.into_header().ok()
}

/// Parse a coordinate line.
///
/// `Ok(None)` means the line does not have the shape of a point at all;
/// an error means it does but one of its angles is malformed.
pub fn parse_coordinate_line(line: &str) -> Result<Option<CoordinatePoint>> {
    let line = line.trim();
    let Some(body) = line.strip_suffix(';') else {
        return Ok(None);
    };
    let body = body.strip_suffix(';').unwrap_or(body);

    let mut parts = body.split(',');
    let (Some(lon), Some(lat), Some(alt), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Ok(None);
    };

    if !looks_sexagesimal(lon) || !looks_sexagesimal(lat) {
        return Ok(None);
    }
    let Some(altitude) = parse_altitude(alt) else {
        return Ok(None);
    };

    Ok(Some(CoordinatePoint {
        longitude: sexagesimal_to_decimal(lon)?,
        latitude: sexagesimal_to_decimal(lat)?,
        altitude,
    }))
}

/// Borrowed pieces of a header-shaped line, before the kind is known.
struct HeaderShape<'a> {
    sequence: &'a str,
    first: char,
    value_a: &'a str,
    second: char,
    value_b: &'a str,
    timestamp: NaiveDateTime,
    total: &'a str,
}

impl HeaderShape<'_> {
    fn into_header(self) -> std::result::Result<RecordHeader, Unrecognized> {
        let kind = RecordKind::from_letters(self.first, self.second).ok_or(
            Unrecognized::UnknownHeaderKind {
                first: self.first,
                second: self.second,
            },
        )?;

        let numbers = (
            self.sequence.parse::<u64>(),
            parse_scaled_integer(self.value_a),
            parse_scaled_integer(self.value_b),
            self.total.parse::<u64>(),
        );
        let (Ok(sequence_number), Ok(a), Ok(b), Ok(total_count)) = numbers else {
            return Err(Unrecognized::Garbled);
        };

        let (field_a, field_b) = kind.interpret_fields(a, b);
        Ok(RecordHeader {
            sequence_number,
            kind,
            field_a,
            field_b,
            timestamp: self.timestamp,
            total_count,
        })
    }
}

fn header_shape(line: &str) -> Option<HeaderShape<'_>> {
    let (fields, meta) = line.split_once(';')?;

    let mut parts = fields.split(',');
    let sequence = parts.next()?.strip_prefix('n')?;
    let (first, value_a) = tagged_field(parts.next()?)?;
    let (second, value_b) = tagged_field(parts.next()?)?;
    if parts.next().is_some() || !digits_at_least(sequence, MIN_SEQUENCE_DIGITS) {
        return None;
    }

    let (timestamp, total) = meta.split_once(',')?;
    let timestamp = parse_timestamp(timestamp.strip_prefix('t')?)?;
    let total = total.strip_prefix('N')?.trim_end_matches(';');
    if !digits_at_least(total, MIN_COUNT_DIGITS) {
        return None;
    }

    Some(HeaderShape {
        sequence,
        first,
        value_a,
        second,
        value_b,
        timestamp,
        total,
    })
}

/// `<letter><digits>` as used by the two payload fields of a header.
fn tagged_field(token: &str) -> Option<(char, &str)> {
    let mut chars = token.chars();
    let letter = chars.next().filter(|c| c.is_ascii_lowercase())?;
    let digits = chars.as_str();
    digits_at_least(digits, MIN_FIELD_DIGITS).then_some((letter, digits))
}

/// `YYYYMMDDHHMM`, device local time.
fn parse_timestamp(token: &str) -> Option<NaiveDateTime> {
    if token.len() != TIMESTAMP_DIGITS || !digits_at_least(token, TIMESTAMP_DIGITS) {
        return None;
    }
    let num = |range: std::ops::Range<usize>| token[range].parse::<u32>().ok();

    let year = i32::try_from(num(0..4)?).ok()?;
    NaiveDate::from_ymd_opt(year, num(4..6)?, num(6..8)?)?.and_hms_opt(num(8..10)?, num(10..12)?, 0)
}

fn looks_sexagesimal(token: &str) -> bool {
    (token.starts_with('+') || token.starts_with('-')) && token.contains('d')
}

fn parse_altitude(token: &str) -> Option<i32> {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn digits_at_least(s: &str, min: usize) -> bool {
    s.len() >= min && s.bytes().all(|b| b.is_ascii_digit())
}
