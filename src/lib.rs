//! # Sail Telemetry Library
//!
//! Telemetry ingestion for an RC sailing boat's serial link.
//!
//! This library provides the core of the ground-station dashboard: the serial
//! transport, the heartbeat-driven connection monitor, the `KEY:VALUE` line
//! protocol, the bounded per-signal time-series store and the CSV
//! record/replay path built on it.

pub mod catalog;
pub mod config;
pub mod error;
pub mod link;
pub mod protocol;
pub mod serial;
pub mod store;
pub mod telemetry;
