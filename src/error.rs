// src/error.rs
//! Error types for the Wanggan GPS toolkit

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GpsError>;

#[derive(Debug, Error)]
pub enum GpsError {
    /// The serial port could not be opened.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The trigger byte could not be written to the device.
    #[error("Failed to send trigger: {0}")]
    WriteFailed(String),

    /// Nothing arrived before the overall download timeout expired.
    #[error("No response from device after {waited:?}")]
    NoResponse { waited: Duration },

    /// A token that should be a coordinate did not decode.
    #[error("Malformed coordinate: {0:?}")]
    MalformedCoordinate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),
}

impl GpsError {
    /// Advice for the user when the failure is on the device side of the link.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            GpsError::ConnectionFailed(_) => {
                Some("check that the port name is correct and not in use by another program")
            }
            GpsError::WriteFailed(_) => Some("check the USB cable and reconnect the device"),
            GpsError::NoResponse { .. } => {
                Some("make sure the device is powered on; power-cycle it and try again")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_have_hints() {
        assert!(GpsError::ConnectionFailed("COM5".into()).hint().is_some());
        assert!(GpsError::WriteFailed("broken pipe".into()).hint().is_some());
        assert!(GpsError::NoResponse { waited: Duration::from_secs(60) }
            .hint()
            .is_some());
        assert!(GpsError::MalformedCoordinate("x".into()).hint().is_none());
    }

    #[test]
    fn test_display() {
        let err = GpsError::MalformedCoordinate("+41d06'".into());
        assert_eq!(err.to_string(), "Malformed coordinate: \"+41d06'\"");
    }
}
