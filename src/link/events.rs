//! Connection events reported to the UI layer.

/// Why a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// User toggled the link off
    Manual,
    /// Read or write failed
    TransportError,
    /// Reader loop stopped
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected { endpoint: String },
    Disconnected { endpoint: String, reason: DisconnectReason },
    TransportError { message: String },
}
