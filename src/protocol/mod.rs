//! # Line Protocol Module
//!
//! Implementation of the boat's ASCII telemetry protocol.
//!
//! This module handles:
//! - Splitting the unframed byte stream into CRLF-terminated lines
//! - Classifying lines as heartbeats or `KEY:VALUE` samples
//! - Strict two-fraction-digit value validation (torn frames are dropped)
//! - Formatting outbound `KEY:VALUE\r\n` commands

pub mod frame;
pub mod encoder;
pub mod decoder;
