//! # Connection Monitor
//!
//! Two-state connection tracker with heartbeat recency.
//!
//! "Healthy" is derived on demand from the last heartbeat, so there is no
//! timer and no third state to keep in sync.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::events::{DisconnectReason, LinkEvent};

/// Default heartbeat window for the health indicator
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(1);

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// Point-in-time copy of the connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: LinkState,
    pub endpoint: Option<String>,
    pub last_heartbeat: Option<Instant>,
    /// Incremented on every successful open
    pub connection_id: u64,
}

impl ConnectionStatus {
    fn disconnected() -> Self {
        Self {
            state: LinkState::Disconnected,
            endpoint: None,
            last_heartbeat: None,
            connection_id: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == LinkState::Connected
    }
}

/// Shared connection state; clones observe the same link
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    status: Arc<Mutex<ConnectionStatus>>,
    heartbeat_timeout: Duration,
    events: broadcast::Sender<LinkEvent>,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT)
    }
}

impl ConnectionMonitor {
    pub fn new(heartbeat_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            status: Arc::new(Mutex::new(ConnectionStatus::disconnected())),
            heartbeat_timeout,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: LinkEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Receive connection events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    /// Transport opened: CONNECTED with a fresh heartbeat
    pub fn on_open(&self, endpoint: &str, now: Instant) {
        {
            let mut status = self.lock();
            status.state = LinkState::Connected;
            status.endpoint = Some(endpoint.to_string());
            status.last_heartbeat = Some(now);
            status.connection_id += 1;
        }
        info!("Link connected on {}", endpoint);
        self.emit(LinkEvent::Connected { endpoint: endpoint.to_string() });
    }

    /// Heartbeat line received. Ignored while disconnected.
    pub fn on_heartbeat(&self, now: Instant) {
        let mut status = self.lock();
        if status.state == LinkState::Connected {
            status.last_heartbeat = Some(now);
        }
    }

    /// Transition to DISCONNECTED
    ///
    /// Returns `true` if the link was connected. The `Disconnected` event is
    /// emitted only on that transition.
    pub fn on_disconnect(&self, reason: DisconnectReason) -> bool {
        let endpoint = {
            let mut status = self.lock();
            if status.state == LinkState::Disconnected {
                return false;
            }
            status.state = LinkState::Disconnected;
            status.last_heartbeat = None;
            status.endpoint.take()
        };

        let endpoint = endpoint.unwrap_or_default();
        match reason {
            DisconnectReason::TransportError => warn!("Link on {} lost", endpoint),
            _ => info!("Link on {} closed ({:?})", endpoint, reason),
        }
        self.emit(LinkEvent::Disconnected { endpoint, reason });
        true
    }

    /// Report a transport failure and drop the connection
    pub fn on_transport_error(&self, message: &str) -> bool {
        warn!("Transport error: {}", message);
        self.emit(LinkEvent::TransportError { message: message.to_string() });
        self.on_disconnect(DisconnectReason::TransportError)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.lock().clone()
    }

    pub fn state(&self) -> LinkState {
        self.lock().state
    }

    pub fn connection_id(&self) -> u64 {
        self.lock().connection_id
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// CONNECTED and a heartbeat within the timeout
    pub fn is_healthy(&self) -> bool {
        self.is_healthy_at(Instant::now())
    }

    /// Health as of `now`; an age of exactly the timeout is unhealthy
    pub fn is_healthy_at(&self, now: Instant) -> bool {
        let status = self.lock();
        status.state == LinkState::Connected
            && status
                .last_heartbeat
                .map_or(false, |t| now.saturating_duration_since(t) < self.heartbeat_timeout)
    }
}
