// src/session.rs
//! Export session: trigger an on-device export and collect the response
//!
//! The device gives no reliable end-of-stream marker, so a download is
//! considered complete once the line has been silent for the idle timeout.
//! A second, absolute deadline caps the whole exchange.

use crate::{
    config::DeviceConfig,
    error::{GpsError, Result},
};
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    time::{sleep, Instant},
};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};

/// The device only answers at this rate.
pub const DEFAULT_BAUDRATE: u32 = 115_200;

/// Export modes, selected by the single byte sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
pub enum TriggerMode {
    /// `~`: records with headers and `!` separators.
    Tilde,
    /// `!`: headerless dump of every coordinate.
    Exclamation,
    /// `^`: undocumented binary metadata.
    Caret,
}

impl TriggerMode {
    pub fn byte(self) -> u8 {
        match self {
            TriggerMode::Tilde => 0x7E,
            TriggerMode::Exclamation => 0x21,
            TriggerMode::Caret => 0x5E,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TriggerMode::Tilde => "tilde",
            TriggerMode::Exclamation => "exclamation",
            TriggerMode::Caret => "caret",
        }
    }

    /// Whether the response is coordinate text the aggregator understands.
    pub fn is_text(self) -> bool {
        !matches!(self, TriggerMode::Caret)
    }
}

/// Byte-level link to the device.
///
/// Implementations must not block in `read_available`; it returns whatever
/// is buffered right now, possibly nothing. `Ok(None)` means the link is
/// gone and nothing more will ever arrive.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Drop anything already buffered on the input side.
    fn discard_input(&mut self) -> Result<()>;

    async fn write_trigger(&mut self, byte: u8) -> Result<()>;

    fn bytes_available(&self) -> Result<usize>;

    async fn read_available(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Serial port transport, 8N1 without flow control.
pub struct SerialTransport {
    port_name: String,
    stream: SerialStream,
}

impl SerialTransport {
    pub fn open(port: &str, baudrate: u32, timeout: Duration) -> Result<Self> {
        info!("Opening {} at {} baud", port, baudrate);

        let stream = tokio_serial::new(port, baudrate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open_native_async()
            .map_err(|e| {
                GpsError::ConnectionFailed(format!("Failed to open serial port {}: {}", port, e))
            })?;

        Ok(Self {
            port_name: port.to_string(),
            stream,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Transport for SerialTransport {
    fn discard_input(&mut self) -> Result<()> {
        self.stream.clear(ClearBuffer::Input)?;
        Ok(())
    }

    async fn write_trigger(&mut self, byte: u8) -> Result<()> {
        let port = self.port_name.clone();
        let write_failed = |e: std::io::Error| GpsError::WriteFailed(format!("{}: {}", port, e));
        self.stream.write_all(&[byte]).await.map_err(write_failed)?;
        self.stream.flush().await.map_err(write_failed)
    }

    fn bytes_available(&self) -> Result<usize> {
        Ok(self.stream.bytes_to_read()? as usize)
    }

    async fn read_available(&mut self) -> Result<Option<Vec<u8>>> {
        let available = self.bytes_available()?;
        if available == 0 {
            return Ok(Some(Vec::new()));
        }
        let mut buf = vec![0u8; available];
        self.stream.read_exact(&mut buf).await?;
        Ok(Some(buf))
    }
}

/// Timing of one export cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Silence after the first byte that ends the download.
    pub idle_timeout: Duration,
    /// Hard cap on the whole read loop.
    pub overall_timeout: Duration,
    /// Pause between polls.
    pub poll_interval: Duration,
    /// Pause between the trigger and the first poll.
    pub settle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(3),
            overall_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(50),
            settle_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// The device went quiet for the idle timeout.
    Idle,
    /// The overall timeout expired; the data may be partial.
    OverallTimeout,
    /// The transport went away.
    TransportClosed,
}

/// Raw bytes collected from one export.
#[derive(Debug, Clone)]
pub struct Capture {
    pub mode: TriggerMode,
    pub data: Vec<u8>,
    pub chunks: usize,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
}

/// Drives trigger/response exchanges over one exclusively owned transport.
pub struct ExportSession<T> {
    transport: T,
    config: SessionConfig,
}

impl ExportSession<SerialTransport> {
    /// Open the configured serial port and wait for it to stabilise.
    pub async fn connect(port: &str, device: &DeviceConfig) -> Result<Self> {
        let config = device.session_config()?;
        let transport = SerialTransport::open(port, device.baudrate, device.read_timeout())?;
        let settle = device.port_settle();
        if !settle.is_zero() {
            sleep(settle).await;
        }
        info!("Connected to {}", port);
        Ok(Self::new(transport, config))
    }
}

impl<T: Transport> ExportSession<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run one export: discard stale input, send the trigger, then read
    /// until the device falls silent or the overall timeout expires.
    ///
    /// An empty response is reported as [`GpsError::NoResponse`].
    pub async fn perform_export(&mut self, mode: TriggerMode) -> Result<Capture> {
        self.transport.discard_input()?;

        info!("Sending {} trigger (0x{:02X})", mode.name(), mode.byte());
        self.transport.write_trigger(mode.byte()).await?;

        if !self.config.settle_delay.is_zero() {
            sleep(self.config.settle_delay).await;
        }

        let capture = self.collect(mode).await;
        if capture.data.is_empty() {
            return Err(GpsError::NoResponse {
                waited: capture.elapsed,
            });
        }

        info!(
            "Received {} bytes in {} chunks ({:?}, {:?})",
            capture.data.len(),
            capture.chunks,
            capture.elapsed,
            capture.stop_reason
        );
        Ok(capture)
    }

    async fn collect(&mut self, mode: TriggerMode) -> Capture {
        let start = Instant::now();
        // Armed by the first byte; before that only the overall deadline applies.
        let mut last_data: Option<Instant> = None;
        let mut data = Vec::new();
        let mut chunks = 0usize;

        let stop_reason = loop {
            if start.elapsed() >= self.config.overall_timeout {
                break StopReason::OverallTimeout;
            }

            match self.transport.read_available().await {
                Ok(Some(chunk)) if !chunk.is_empty() => {
                    data.extend_from_slice(&chunk);
                    chunks += 1;
                    last_data = Some(Instant::now());
                    if chunks % 10 == 0 {
                        debug!("Received {} bytes so far", data.len());
                    }
                }
                Ok(Some(_)) => {
                    if last_data.is_some_and(|t| t.elapsed() >= self.config.idle_timeout) {
                        debug!("Stream idle for {:?}, ending reception", self.config.idle_timeout);
                        break StopReason::Idle;
                    }
                }
                Ok(None) => break StopReason::TransportClosed,
                Err(e) => {
                    warn!("Read failed, keeping {} bytes received so far: {}", data.len(), e);
                    break StopReason::TransportClosed;
                }
            }

            sleep(self.config.poll_interval).await;
        };

        Capture {
            mode,
            data,
            chunks,
            elapsed: start.elapsed(),
            stop_reason,
        }
    }
}

/// Names of the serial ports present on this machine.
pub fn list_serial_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| GpsError::ConnectionFailed(format!("Failed to list serial ports: {}", e)))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
