//! # Serial Communication Module
//!
//! Handles the serial link to the boat's STM32 controller.
//!
//! This module handles:
//! - Enumerating candidate serial ports
//! - Opening the port at 115,200 baud, 8N1, no flow control
//! - Non-blocking reads of whatever bytes are buffered
//! - Writing outbound command lines

pub mod transport;

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt};
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::error::{Result, TelemetryError};
pub use transport::{open_first, shared, LinkTransport, SharedTransport};

/// Default baud rate of the telemetry UART
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default serial read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial port transport backed by `tokio-serial`
pub struct SerialLink {
    /// Serial port handle while connected
    port: Option<tokio_serial::SerialStream>,
    /// Device path (e.g., /dev/ttyUSB0)
    endpoint: Option<String>,
    baud_rate: u32,
    timeout: Duration,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("endpoint", &self.endpoint)
            .field("baud_rate", &self.baud_rate)
            .finish_non_exhaustive()
    }
}

impl Default for SerialLink {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT)
    }
}

impl SerialLink {
    /// Create a closed link with the given line settings
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self {
            port: None,
            endpoint: None,
            baud_rate,
            timeout,
        }
    }

    pub fn from_config(config: &SerialConfig) -> Self {
        Self::new(config.baud_rate, config.timeout())
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Open a specific serial port with the telemetry line settings
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0")
    fn open_port(&self, path: &str) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(self.timeout)
            .open_native_async()
            .map_err(|e| TelemetryError::Transport(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    fn port_mut(&mut self) -> Result<&mut tokio_serial::SerialStream> {
        self.port.as_mut().ok_or(TelemetryError::NotConnected)
    }
}

/// List serial ports known to the OS
pub fn available_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| TelemetryError::Transport(format!("Failed to enumerate serial ports: {}", e)))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[async_trait]
impl LinkTransport for SerialLink {
    fn enumerate(&self) -> Result<Vec<String>> {
        available_ports()
    }

    fn open(&mut self, endpoint: &str) -> Result<()> {
        self.close();
        let port = self.open_port(endpoint)?;
        info!("Serial port {} opened at {} baud", endpoint, self.baud_rate);
        self.port = Some(port);
        self.endpoint = Some(endpoint.to_string());
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Serial port {} closed", self.endpoint.as_deref().unwrap_or("?"));
        }
        self.endpoint = None;
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    fn bytes_available(&self) -> Result<usize> {
        let port = self.port.as_ref().ok_or(TelemetryError::NotConnected)?;
        let count = port
            .bytes_to_read()
            .map_err(|e| TelemetryError::Transport(format!("Failed to query serial port: {}", e)))?;
        Ok(count as usize)
    }

    async fn read_available(&mut self) -> Result<Vec<u8>> {
        let available = self.bytes_available()?;
        if available == 0 {
            return Ok(Vec::new());
        }

        let timeout = self.timeout;
        let port = self.port_mut()?;
        let mut buf = vec![0u8; available];

        let read = match tokio::time::timeout(timeout, port.read(&mut buf)).await {
            Ok(result) => result
                .map_err(|e| TelemetryError::Transport(format!("Failed to read serial port: {}", e)))?,
            Err(_) => 0,
        };

        buf.truncate(read);
        debug!("Read {} of {} available bytes", read, available);
        Ok(buf)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port_mut()?;

        port.write_all(bytes).await
            .map_err(|e| TelemetryError::Transport(format!("Failed to write to serial port: {}", e)))?;

        port.flush().await
            .map_err(|e| TelemetryError::Transport(format!("Failed to flush serial port: {}", e)))?;

        debug!("Wrote {} bytes", bytes.len());
        Ok(())
    }
}
