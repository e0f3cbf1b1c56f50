// src/gps/coord.rs
//! Coordinate conversions between the device encodings and decimal degrees
//!
//! Coordinate lines carry sexagesimal angles such as `-008d35'22.330"`.
//! Header lines carry angles as fixed-point integers scaled by 10^7.

use crate::error::{GpsError, Result};

/// Divisor turning a header's scaled integer into decimal degrees.
pub const SCALED_INTEGER_DIVISOR: f64 = 10_000_000.0;

/// Fractional-second digits written by [`decimal_to_sexagesimal`].
const SECOND_DIGITS: u32 = 5;

/// Which axis an angle belongs to; only affects the degree width when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn degree_width(self) -> usize {
        match self {
            Axis::Latitude => 2,
            Axis::Longitude => 3,
        }
    }
}

/// Convert `SIGN DEG "d" MIN "'" SEC '"'` to signed decimal degrees.
///
/// The shape is checked strictly: explicit sign, 2-3 degree digits, exactly
/// two minute digits and seconds with a fractional part. Anything else is
/// rejected with [`GpsError::MalformedCoordinate`].
pub fn sexagesimal_to_decimal(text: &str) -> Result<f64> {
    let malformed = || GpsError::MalformedCoordinate(text.to_string());

    let (sign, rest) = if let Some(rest) = text.strip_prefix('+') {
        (1.0, rest)
    } else if let Some(rest) = text.strip_prefix('-') {
        (-1.0, rest)
    } else {
        return Err(malformed());
    };

    let (degrees, rest) = rest.split_once('d').ok_or_else(malformed)?;
    let (minutes, rest) = rest.split_once('\'').ok_or_else(malformed)?;
    let seconds = rest.strip_suffix('"').ok_or_else(malformed)?;

    if !(2..=3).contains(&degrees.len()) || !all_digits(degrees) {
        return Err(malformed());
    }
    if minutes.len() != 2 || !all_digits(minutes) {
        return Err(malformed());
    }
    match seconds.split_once('.') {
        Some((whole, frac)) if all_digits(whole) && all_digits(frac) => {}
        _ => return Err(malformed()),
    }

    let degrees: f64 = degrees.parse().map_err(|_| malformed())?;
    let minutes: f64 = minutes.parse().map_err(|_| malformed())?;
    let seconds: f64 = seconds.parse().map_err(|_| malformed())?;

    Ok(sign * (degrees + minutes / 60.0 + seconds / 3600.0))
}

/// Parse a header's fixed-point integer token, sign optional.
pub fn parse_scaled_integer(text: &str) -> Result<i64> {
    text.parse::<i64>()
        .map_err(|_| GpsError::MalformedCoordinate(text.to_string()))
}

/// Convert a scaled-integer token (degrees * 10^7) to decimal degrees.
pub fn scaled_integer_to_decimal(text: &str) -> Result<f64> {
    parse_scaled_integer(text).map(scaled_to_degrees)
}

pub fn scaled_to_degrees(value: i64) -> f64 {
    value as f64 / SCALED_INTEGER_DIVISOR
}

/// Encode decimal degrees in the device's sexagesimal notation.
///
/// Used to build fixtures; rounding is done on whole 10^-5 seconds so a
/// value never renders as `60.00000"`.
pub fn decimal_to_sexagesimal(value: f64, axis: Axis) -> String {
    let sign = if value.is_sign_negative() && value != 0.0 { '-' } else { '+' };
    let scale = 10u64.pow(SECOND_DIGITS);
    let ticks = (value.abs() * 3600.0 * scale as f64).round() as u64;

    let whole_seconds = ticks / scale;
    let fraction = ticks % scale;
    let degrees = whole_seconds / 3600;
    let minutes = (whole_seconds % 3600) / 60;
    let seconds = whole_seconds % 60;

    format!(
        "{sign}{degrees:0width$}d{minutes:02}'{seconds:02}.{fraction:0digits$}\"",
        width = axis.degree_width(),
        digits = SECOND_DIGITS as usize,
    )
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sexagesimal_parsing() {
        let lon = sexagesimal_to_decimal("-008d35'22.330\"").unwrap();
        assert!((lon - -8.589536).abs() < 1e-6);

        let lat = sexagesimal_to_decimal("+41d06'52.71840\"").unwrap();
        assert!((lat - 41.114644).abs() < 1e-6);

        let east = sexagesimal_to_decimal("+120d00'00.0\"").unwrap();
        assert_eq!(east, 120.0);
    }

    #[test]
    fn test_sexagesimal_rejects_bad_shapes() {
        let bad = [
            "",
            "008d35'22.330\"",   // no sign
            "-8d35'22.330\"",    // one degree digit
            "-0008d35'22.330\"", // four degree digits
            "-008d5'22.330\"",   // one minute digit
            "-008d35'22\"",      // no fractional seconds
            "-008d35'22.330",    // no closing quote
            "-008d35'22.330\"x", // trailing garbage
            "-008d35'.330\"",
            "-008d35'22.\"",
            "+41d06'5O.109\"",
            "+ä1d06'50.109\"",
        ];
        for text in bad {
            match sexagesimal_to_decimal(text) {
                Err(GpsError::MalformedCoordinate(s)) => assert_eq!(s, text),
                other => panic!("{text:?} should be malformed, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_scaled_integer() {
        let value = scaled_integer_to_decimal("0000019335").unwrap();
        assert!((value - 0.0019335).abs() < 1e-9);

        assert_eq!(scaled_integer_to_decimal("-1200000000").unwrap(), -120.0);
        assert_eq!(scaled_integer_to_decimal("+450000000").unwrap(), 45.0);
        assert_eq!(parse_scaled_integer("0000000000").unwrap(), 0);

        assert!(scaled_integer_to_decimal("").is_err());
        assert!(scaled_integer_to_decimal("12a4").is_err());
        assert!(scaled_integer_to_decimal("99999999999999999999999").is_err());
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            (-8.5895361, Axis::Longitude),
            (41.1139191, Axis::Latitude),
            (-179.9999999, Axis::Longitude),
            (179.999999, Axis::Longitude),
            (-89.5, Axis::Latitude),
            (0.0000042, Axis::Latitude),
            (12.3456789, Axis::Longitude),
        ];
        for (value, axis) in samples {
            let text = decimal_to_sexagesimal(value, axis);
            let back = sexagesimal_to_decimal(&text).unwrap();
            assert!((back - value).abs() < 1e-5, "{value} -> {text} -> {back}");
        }
    }

    #[test]
    fn test_encoding_shape() {
        assert_eq!(
            decimal_to_sexagesimal(-8.589536111111112, Axis::Longitude),
            "-008d35'22.33000\""
        );
        assert_eq!(decimal_to_sexagesimal(41.0, Axis::Latitude), "+41d00'00.00000\"");
        // 59.999999 s rounds up into the next minute rather than to 60 s
        assert_eq!(
            decimal_to_sexagesimal(10.0 + 59.999999 / 3600.0, Axis::Latitude),
            "+10d01'00.00000\""
        );
    }
}
