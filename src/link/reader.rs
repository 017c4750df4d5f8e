//! # Link Reader
//!
//! Background ingestion loop: drains the serial link, decodes lines and routes
//! heartbeats to the [`ConnectionMonitor`] and samples to the
//! [`TimeSeriesStore`].
//!
//! The loop runs on its own tokio task, independent of any UI refresh
//! cadence. Transport failures close the port and the loop keeps going so a
//! later reconnect can pick up where it left off.

use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::events::DisconnectReason;
use super::monitor::ConnectionMonitor;
use super::{drop_connection, LinkControl};
use crate::config::Config;
use crate::protocol::decoder::FrameDecoder;
use crate::protocol::frame::{Frame, HEARTBEAT_MARKER};
use crate::serial::SharedTransport;
use crate::store::TimeSeriesStore;

/// Idle sleep between polls when no bytes were available
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Result of one poll of the link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub bytes: usize,
    pub samples: usize,
    pub heartbeats: usize,
    /// The poll hit a transport error and dropped the connection
    pub dropped: bool,
}

/// Owns the decoder and drives ingestion from the shared transport
pub struct LinkReader {
    transport: SharedTransport,
    monitor: ConnectionMonitor,
    store: TimeSeriesStore,
    decoder: FrameDecoder,
    poll_interval: Duration,
    /// Connection the decoder's carry-over bytes belong to
    connection_id: u64,
}

impl LinkReader {
    pub fn new(transport: SharedTransport, monitor: ConnectionMonitor, store: TimeSeriesStore) -> Self {
        Self {
            transport,
            monitor,
            store,
            decoder: FrameDecoder::new(HEARTBEAT_MARKER),
            poll_interval: DEFAULT_POLL_INTERVAL,
            connection_id: 0,
        }
    }

    /// Reader using the configured poll interval and heartbeat marker
    pub fn from_config(
        transport: SharedTransport,
        monitor: ConnectionMonitor,
        store: TimeSeriesStore,
        config: &Config,
    ) -> Self {
        Self::new(transport, monitor, store)
            .with_poll_interval(config.serial.poll_interval())
            .with_heartbeat_marker(&config.link.heartbeat_marker)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_heartbeat_marker(mut self, marker: &str) -> Self {
        self.decoder = FrameDecoder::new(marker);
        self
    }

    /// Controls sharing this reader's transport, monitor and store
    pub fn control(&self) -> LinkControl {
        LinkControl::new(self.transport.clone(), self.monitor.clone(), self.store.clone())
    }

    /// Lines dropped by the decoder so far
    pub fn skipped_lines(&self) -> u64 {
        self.decoder.skipped()
    }

    /// Drain what the transport has buffered and ingest it
    pub async fn poll_once(&mut self) -> PollStats {
        let mut stats = PollStats::default();

        let connection_id = self.monitor.connection_id();
        if connection_id != self.connection_id {
            self.decoder.reset();
            self.connection_id = connection_id;
        }

        if !self.monitor.is_connected() {
            return stats;
        }

        let bytes = {
            let mut transport = self.transport.lock().await;
            if !transport.is_open() {
                return stats;
            }
            match transport.read_available().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    drop_connection(&mut **transport, &self.monitor, &e);
                    self.decoder.reset();
                    stats.dropped = true;
                    return stats;
                }
            }
        };

        if bytes.is_empty() {
            return stats;
        }
        stats.bytes = bytes.len();

        for frame in self.decoder.feed(&bytes) {
            match frame {
                Frame::Heartbeat => {
                    self.monitor.on_heartbeat(Instant::now());
                    stats.heartbeats += 1;
                }
                Frame::Sample { key, value } => {
                    self.store.append(&key, value, self.store.elapsed());
                    stats.samples += 1;
                }
            }
        }

        stats
    }

    /// Run until `cancel` fires, then close the transport
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Link reader started (poll interval {:?})", self.poll_interval);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let stats = self.poll_once().await;

            if stats.bytes == 0 {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            } else {
                debug!("Ingested {} samples, {} heartbeats", stats.samples, stats.heartbeats);
                tokio::task::yield_now().await;
            }
        }

        let mut transport = self.transport.lock().await;
        transport.close();
        self.monitor.on_disconnect(DisconnectReason::Shutdown);
        info!("Link reader stopped ({} lines skipped)", self.decoder.skipped());
    }

    /// Move the loop onto its own task
    pub fn spawn(self) -> ReaderHandle {
        let cancel = CancellationToken::new();
        let control = self.control();
        let task = tokio::spawn(self.run(cancel.clone()));
        ReaderHandle { cancel, task, control }
    }
}

/// Handle to a spawned [`LinkReader`]
pub struct ReaderHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    control: LinkControl,
}

impl ReaderHandle {
    pub fn control(&self) -> &LinkControl {
        &self.control
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request a stop and wait for the loop to close the transport and exit
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("Link reader task failed: {}", e);
        }
    }
}
