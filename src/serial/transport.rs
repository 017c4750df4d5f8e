//! Trait abstraction for the byte-stream link to enable testing

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, TelemetryError};

/// Byte-stream connection to the boat's controller
///
/// Implementations never retry: every failure is returned to the caller,
/// which owns the reconnect policy.
#[async_trait]
pub trait LinkTransport: Send {
    /// Candidate endpoint identifiers (e.g. `/dev/ttyUSB0`, `COM3`)
    fn enumerate(&self) -> Result<Vec<String>>;

    /// Open `endpoint`, closing any previous connection first
    fn open(&mut self, endpoint: &str) -> Result<()>;

    /// Close the connection. Closing a closed link is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Endpoint of the open connection
    fn endpoint(&self) -> Option<&str>;

    /// Bytes buffered by the OS and ready to read
    fn bytes_available(&self) -> Result<usize>;

    /// Read whatever is currently buffered, possibly nothing. Never waits for data.
    async fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Write all bytes and flush
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Transport shared between the reader loop and the command sender
pub type SharedTransport = Arc<Mutex<Box<dyn LinkTransport>>>;

/// Wrap a transport for sharing
pub fn shared<T: LinkTransport + 'static>(transport: T) -> SharedTransport {
    Arc::new(Mutex::new(Box::new(transport)))
}

/// Try each candidate in order and keep the first that opens
///
/// # Returns
///
/// * `Result<String>` - The endpoint that was opened
///
/// # Errors
///
/// Returns `PortNotFound` listing every endpoint tried
pub fn open_first<S: AsRef<str>>(transport: &mut dyn LinkTransport, candidates: &[S]) -> Result<String> {
    for candidate in candidates {
        let endpoint = candidate.as_ref();
        debug!("Trying to open serial port: {}", endpoint);

        match transport.open(endpoint) {
            Ok(()) => {
                info!("Successfully opened serial port {}", endpoint);
                return Ok(endpoint.to_string());
            }
            Err(e) => {
                warn!("Failed to open {}: {}", endpoint, e);
                continue;
            }
        }
    }

    Err(TelemetryError::PortNotFound(
        candidates.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
    ))
}
