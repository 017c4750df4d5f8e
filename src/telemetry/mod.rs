//! # Telemetry Module
//!
//! Session recording and replay on top of the time-series store.
//!
//! This module handles:
//! - Writing the latest signal values to CSV at a caller-driven cadence
//! - Loading a CSV log back into the same history types live data uses
//! - Sampling-rate statistics of recorded signals

pub mod logger;
pub mod replay;
pub mod stats;

pub use logger::SessionLogger;
pub use stats::SignalStats;
