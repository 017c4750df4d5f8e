//! # Command Encoder
//!
//! Formats outbound commands in the same wire format the decoder accepts.

use super::frame::*;
use crate::error::{Result, TelemetryError};

/// Encode a command as `KEY:VALUE\r\n` with two fraction digits
///
/// # Errors
///
/// Returns `InvalidValue` if the value is not finite or the key is empty or
/// contains the separator or a line break.
///
/// # Examples
///
/// ```
/// use sail_telemetry::protocol::encoder::encode_command;
///
/// let line = encode_command("RUD", 12.345).unwrap();
/// assert_eq!(line, "RUD:12.35\r\n");
/// ```
pub fn encode_command(key: &str, value: f64) -> Result<String> {
    validate_key(key)?;

    if !value.is_finite() {
        return Err(TelemetryError::InvalidValue(format!(
            "{} value must be a finite number, got {}",
            key, value
        )));
    }

    Ok(format!(
        "{}{}{:.*}{}",
        key, KEY_VALUE_SEPARATOR, FRACTION_DIGITS, value, LINE_TERMINATOR
    ))
}

/// The value the controller receives for `value`, i.e. `value` rounded the
/// way [`encode_command`] formats it
pub fn wire_value(value: f64) -> f64 {
    format!("{:.*}", FRACTION_DIGITS, value).parse().unwrap_or(value)
}

/// Parse user-entered text into a command value
///
/// Accepts any decimal notation `f64` understands; only the encoded form is
/// restricted to two fraction digits.
pub fn parse_command_value(text: &str) -> Result<f64> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| TelemetryError::InvalidValue(format!("{:?} is not a number", text)))?;

    if !value.is_finite() {
        return Err(TelemetryError::InvalidValue(format!("{:?} is not a finite number", text)));
    }
    Ok(value)
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(TelemetryError::InvalidValue("signal key cannot be empty".to_string()));
    }
    if key.contains(KEY_VALUE_SEPARATOR) || key.contains('\r') || key.contains('\n') {
        return Err(TelemetryError::InvalidValue(format!(
            "signal key {:?} cannot contain ':' or line breaks",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{classify_line, Frame};

    #[test]
    fn test_encode_rounds_to_two_digits() {
        assert_eq!(encode_command("RUD", 12.345).unwrap(), "RUD:12.35\r\n");
        assert_eq!(encode_command("RUD", 12.0).unwrap(), "RUD:12.00\r\n");
        assert_eq!(encode_command("SAI", -45.5).unwrap(), "SAI:-45.50\r\n");
    }

    #[test]
    fn test_encode_rejects_non_finite() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            match encode_command("RUD", value) {
                Err(TelemetryError::InvalidValue(_)) => {}
                other => panic!("Expected InvalidValue for {}, got: {:?}", value, other),
            }
        }
    }

    #[test]
    fn test_encode_rejects_bad_keys() {
        assert!(encode_command("", 1.0).is_err());
        assert!(encode_command("RU:D", 1.0).is_err());
        assert!(encode_command("RUD\r\n", 1.0).is_err());
    }

    #[test]
    fn test_encoded_command_decodes_back() {
        let line = encode_command("RUD", -7.126).unwrap();
        let frame = classify_line(line.trim_end(), HEARTBEAT_MARKER);
        assert_eq!(frame, Some(Frame::Sample { key: "RUD".to_string(), value: -7.13 }));
    }

    #[test]
    fn test_wire_value_matches_encoded_line() {
        assert_eq!(wire_value(12.345), 12.35);
        assert_eq!(wire_value(-7.126), -7.13);
        assert_eq!(wire_value(3.0), 3.0);
    }

    #[test]
    fn test_parse_command_value() {
        assert_eq!(parse_command_value("12.345").unwrap(), 12.345);
        assert_eq!(parse_command_value(" -3 ").unwrap(), -3.0);
        assert!(parse_command_value("abc").is_err());
        assert!(parse_command_value("").is_err());
        assert!(parse_command_value("inf").is_err());
    }
}
