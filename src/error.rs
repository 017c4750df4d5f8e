//! # Error Types
//!
//! Custom error types for the telemetry core using `thiserror`.
//!
//! Malformed wire lines are not represented here: torn frames are routine on
//! an unframed serial link and the decoder drops them without raising.

use thiserror::Error;

/// Main error type for the telemetry core
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Serial open/read/write failure. Always terminal for the current connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// None of the candidate endpoints could be opened
    #[error("No serial port could be opened (tried: {0})")]
    PortNotFound(String),

    /// Operation needs an open link
    #[error("Serial link is not connected")]
    NotConnected,

    /// Command value (or key) rejected before any I/O happened
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Configuration parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signal catalog parse errors
    #[error("Signal catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    /// CSV log read/write errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A recorded log cannot replace live data while the link is open
    #[error("Cannot load a log while connected")]
    ReplayWhileConnected,

    /// `record`/`stop` called without an active session
    #[error("Logging session is not active")]
    LoggerInactive,

    /// `start` called while a session is already running
    #[error("Logging session is already active")]
    LoggerActive,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the telemetry core
pub type Result<T> = std::result::Result<T, TelemetryError>;
