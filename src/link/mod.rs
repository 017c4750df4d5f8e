//! # Link Module
//!
//! Connection lifecycle for the boat's serial link.
//!
//! This module handles:
//! - Tracking CONNECTED/DISCONNECTED and heartbeat health
//! - The background reader loop feeding the time-series store
//! - Manual connect/disconnect from the UI
//! - Sending outbound commands
//!
//! Any transport failure closes the port and flips the monitor to
//! DISCONNECTED. Nothing here retries on its own.

pub mod events;
pub mod monitor;
pub mod reader;
pub mod sender;

use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::{Result, TelemetryError};
use crate::serial::{open_first, LinkTransport, SharedTransport};
use crate::store::TimeSeriesStore;
use crate::telemetry::replay;

pub use events::{DisconnectReason, LinkEvent};
pub use monitor::{ConnectionMonitor, ConnectionStatus, LinkState};
pub use reader::{LinkReader, ReaderHandle};
pub use sender::CommandSender;

/// Close the transport after a failed read/write and record the loss
pub(crate) fn drop_connection(
    transport: &mut dyn LinkTransport,
    monitor: &ConnectionMonitor,
    error: &TelemetryError,
) -> bool {
    transport.close();
    monitor.on_transport_error(&error.to_string())
}

/// User-facing connection controls shared with the reader loop
#[derive(Clone)]
pub struct LinkControl {
    transport: SharedTransport,
    monitor: ConnectionMonitor,
    store: TimeSeriesStore,
}

impl LinkControl {
    pub fn new(transport: SharedTransport, monitor: ConnectionMonitor, store: TimeSeriesStore) -> Self {
        Self { transport, monitor, store }
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    /// Candidate endpoints reported by the transport
    pub async fn ports(&self) -> Result<Vec<String>> {
        self.transport.lock().await.enumerate()
    }

    /// Open `endpoint`; the monitor becomes CONNECTED with a fresh heartbeat
    pub async fn connect(&self, endpoint: &str) -> Result<()> {
        let mut transport = self.transport.lock().await;
        if self.monitor.is_connected() {
            transport.close();
            self.monitor.on_disconnect(DisconnectReason::Manual);
        }
        transport.open(endpoint)?;
        self.monitor.on_open(endpoint, Instant::now());
        Ok(())
    }

    /// Open the first candidate that works, returning its endpoint
    pub async fn connect_any<S: AsRef<str>>(&self, candidates: &[S]) -> Result<String> {
        let mut transport = self.transport.lock().await;
        if self.monitor.is_connected() {
            transport.close();
            self.monitor.on_disconnect(DisconnectReason::Manual);
        }
        let endpoint = open_first(&mut **transport, candidates)?;
        self.monitor.on_open(&endpoint, Instant::now());
        Ok(endpoint)
    }

    /// Manual disconnect; returns whether a connection was closed
    pub async fn disconnect(&self) -> bool {
        let mut transport = self.transport.lock().await;
        transport.close();
        self.monitor.on_disconnect(DisconnectReason::Manual)
    }

    /// Status-indicator behaviour: disconnect if connected, otherwise open
    /// `endpoint` (or the first enumerated port when `None`).
    ///
    /// Returns the new link state.
    pub async fn toggle(&self, endpoint: Option<&str>) -> Result<LinkState> {
        if self.monitor.is_connected() {
            self.disconnect().await;
            return Ok(LinkState::Disconnected);
        }

        match endpoint {
            Some(endpoint) => self.connect(endpoint).await?,
            None => {
                let ports = self.ports().await?;
                self.connect_any(&ports).await?;
            }
        }
        Ok(LinkState::Connected)
    }

    /// Replace the store contents with a recorded CSV log
    ///
    /// # Errors
    ///
    /// Refused while connected so live samples and replayed ones never mix
    pub async fn load_replay<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        if self.monitor.is_connected() {
            return Err(TelemetryError::ReplayWhileConnected);
        }
        let rows = replay::load_into(path.as_ref(), &self.store)?;
        info!("Loaded {} rows from {}", rows, path.as_ref().display());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::shared;
    use crate::serial::transport::mocks::MockLink;

    fn control(mock: &MockLink) -> LinkControl {
        LinkControl::new(shared(mock.clone()), ConnectionMonitor::default(), TimeSeriesStore::new(100))
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let mock = MockLink::new(&["COM3"]);
        let control = control(&mock);

        control.connect("COM3").await.unwrap();
        assert!(control.monitor().is_connected());
        assert!(control.monitor().is_healthy());
        assert!(mock.is_link_open());

        assert!(control.disconnect().await);
        assert!(!control.monitor().is_connected());
        assert!(!mock.is_link_open());
        assert!(!control.disconnect().await);
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let mock = MockLink::new(&["COM3"]);
        let control = control(&mock);
        let mut events = control.monitor().subscribe();

        assert!(control.connect("COM9").await.is_err());
        assert!(!control.monitor().is_connected());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_toggle_uses_first_enumerated_port() {
        let mock = MockLink::new(&["/dev/ttyACM0", "/dev/ttyUSB0"]);
        mock.set_unopenable("/dev/ttyACM0");
        let control = control(&mock);

        assert_eq!(control.toggle(None).await.unwrap(), LinkState::Connected);
        assert_eq!(control.monitor().status().endpoint.as_deref(), Some("/dev/ttyUSB0"));

        assert_eq!(control.toggle(None).await.unwrap(), LinkState::Disconnected);
        assert!(!mock.is_link_open());
    }

    #[tokio::test]
    async fn test_toggle_without_ports_fails() {
        let mock = MockLink::new(&[]);
        let control = control(&mock);
        assert!(matches!(control.toggle(None).await, Err(TelemetryError::PortNotFound(_))));
    }

    #[tokio::test]
    async fn test_reconnect_switches_endpoint() {
        let mock = MockLink::new(&["COM3", "COM4"]);
        let control = control(&mock);

        control.connect("COM3").await.unwrap();
        control.connect("COM4").await.unwrap();
        assert_eq!(control.monitor().status().endpoint.as_deref(), Some("COM4"));
        assert_eq!(mock.open_count(), 2);
        assert_eq!(mock.close_count(), 1);
    }

    #[tokio::test]
    async fn test_load_replay_refused_while_connected() {
        let mock = MockLink::new(&["COM3"]);
        let control = control(&mock);
        control.connect("COM3").await.unwrap();

        let result = control.load_replay("/nonexistent.csv").await;
        assert!(matches!(result, Err(TelemetryError::ReplayWhileConnected)));
        assert!(control.monitor().is_connected());
        assert!(mock.is_link_open());
    }

    #[tokio::test]
    async fn test_load_replay_while_disconnected() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"t,ROL\n0.0,1.5\n0.5,2.5\n").unwrap();
        file.flush().unwrap();

        let mock = MockLink::new(&["COM3"]);
        let control = control(&mock);
        control.store().append("OLD", 1.0, 0.0);

        assert_eq!(control.load_replay(file.path()).await.unwrap(), 2);
        assert_eq!(control.store().keys(), vec!["ROL".to_string()]);
        assert_eq!(control.store().latest("ROL").unwrap().value, 2.5);
    }
}
