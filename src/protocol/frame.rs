//! # Line Protocol Constants and Types
//!
//! Core definitions for the `KEY:VALUE` line protocol.

/// Default liveness marker sent by the boat between sample bursts
pub const HEARTBEAT_MARKER: &str = "OK";

/// Separator between signal key and value
pub const KEY_VALUE_SEPARATOR: char = ':';

/// Outbound line terminator
pub const LINE_TERMINATOR: &str = "\r\n";

/// Number of fraction digits in the canonical wire format
pub const FRACTION_DIGITS: usize = 2;

/// Longest line the decoder will buffer before discarding it as noise
pub const MAX_LINE_LEN: usize = 256;

/// One classified inbound line
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Liveness marker; resets the heartbeat clock
    Heartbeat,
    /// Telemetry sample for one signal
    Sample { key: String, value: f64 },
}

/// Parse a wire value of the form `[+-]DIGITS.DD`.
///
/// Anything else (missing digits, one or three fraction digits, exponents,
/// `inf`/`nan`) is rejected, so truncated frames like `12.3` never parse as a
/// value of the wrong magnitude.
pub fn parse_wire_value(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let unsigned = match bytes.first() {
        Some(b'+') | Some(b'-') => &bytes[1..],
        _ => bytes,
    };

    let dot = unsigned.iter().position(|&b| b == b'.')?;
    let (int_part, frac_part) = (&unsigned[..dot], &unsigned[dot + 1..]);

    if int_part.is_empty() || !int_part.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if frac_part.len() != FRACTION_DIGITS || !frac_part.iter().all(u8::is_ascii_digit) {
        return None;
    }

    text.parse::<f64>().ok()
}

/// Classify one line (terminator already removed).
///
/// Returns `None` for empty lines, lines without a separator, empty keys and
/// malformed values.
pub fn classify_line(line: &str, heartbeat_marker: &str) -> Option<Frame> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == heartbeat_marker {
        return Some(Frame::Heartbeat);
    }

    let (key, value) = line.split_once(KEY_VALUE_SEPARATOR)?;
    if key.is_empty() {
        return None;
    }

    // Firmware emits "KEY: VALUE"
    let value = parse_wire_value(value.trim_start())?;

    Some(Frame::Sample { key: key.to_string(), value })
}
