//! Outbound command lines (`KEY:VALUE\r\n`) to the controller.

use tracing::debug;

use super::drop_connection;
use super::monitor::ConnectionMonitor;
use crate::error::{Result, TelemetryError};
use crate::protocol::encoder::{encode_command, parse_command_value, wire_value};
use crate::serial::SharedTransport;
use crate::store::TimeSeriesStore;

/// Writes commands over the transport shared with the reader loop
#[derive(Clone)]
pub struct CommandSender {
    transport: SharedTransport,
    monitor: ConnectionMonitor,
}

impl CommandSender {
    pub fn new(transport: SharedTransport, monitor: ConnectionMonitor) -> Self {
        Self { transport, monitor }
    }

    /// Encode and write one command line
    ///
    /// # Errors
    ///
    /// * `InvalidValue` - the command cannot be encoded; nothing is written
    /// * `NotConnected` - the link is closed
    /// * `Transport` - the write failed; the link is now DISCONNECTED
    pub async fn send(&self, key: &str, value: f64) -> Result<String> {
        let line = encode_command(key, value)?;

        let mut transport = self.transport.lock().await;
        if !self.monitor.is_connected() || !transport.is_open() {
            return Err(TelemetryError::NotConnected);
        }

        if let Err(e) = transport.write(line.as_bytes()).await {
            drop_connection(&mut **transport, &self.monitor, &e);
            return Err(e);
        }

        debug!("Sent {}", line.trim_end());
        Ok(line)
    }

    /// Send a value typed by the user, e.g. from a text box
    pub async fn send_text(&self, key: &str, text: &str) -> Result<String> {
        let value = parse_command_value(text)?;
        self.send(key, value).await
    }

    /// Send, then record the commanded value in `store` so TX signals plot
    /// alongside RX ones. The stored value is the rounded one that went on
    /// the wire.
    pub async fn send_and_record(&self, key: &str, value: f64, store: &TimeSeriesStore) -> Result<String> {
        let line = self.send(key, value).await?;
        store.append_now(key, wire_value(value));
        Ok(line)
    }
}
