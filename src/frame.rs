//! # Frame Parser
//!
//! Decodes raw notification payloads from the sensor into validated
//! [`Sample`] records.
//!
//! The firmware emits one line of text per notification:
//!
//! ```text
//! <device uptime>,<bus V>,<shunt mV>,<current mA>,<power mW>
//! ```
//!
//! Anything that does not match that shape is rejected with a
//! [`FrameRejection`] naming the reason; rejections are diagnostic
//! events for the caller to log, never errors that propagate.

use chrono::{DateTime, Local};
use thiserror::Error;

/// One validated telemetry reading.
///
/// Immutable once constructed; safely shared by value between the
/// acquisition and consumption tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Timestamp token supplied by the device (its uptime as `HH:MM:SS`).
    /// Stored verbatim, never validated.
    pub device_timestamp: String,
    /// Wall-clock time on this host, stamped at parse time.
    pub host_timestamp: DateTime<Local>,
    /// Bus voltage in volts
    pub bus_voltage: f64,
    /// Shunt voltage in millivolts
    pub shunt_voltage_mv: f64,
    /// Current in milliamps
    pub current_ma: f64,
    /// Power in milliwatts
    pub power_mw: f64,
}

impl Sample {
    /// Host timestamp in the text form used for the durable log
    /// (ISO-8601-like, space separator).
    pub fn host_timestamp_text(&self) -> String {
        self.host_timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }

    /// The sample as one 6-field log record, in header order.
    pub fn log_record(&self) -> [String; 6] {
        [
            self.device_timestamp.clone(),
            self.host_timestamp_text(),
            self.bus_voltage.to_string(),
            self.shunt_voltage_mv.to_string(),
            self.current_ma.to_string(),
            self.power_mw.to_string(),
        ]
    }
}

/// Why a payload was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Payload was not valid UTF-8
    DecodeError,
    /// Fewer than 5 comma-delimited fields
    MalformedFrame,
    /// A measurement field did not parse to a finite number
    NumericParseError,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RejectReason::DecodeError => "decode_error",
            RejectReason::MalformedFrame => "malformed_frame",
            RejectReason::NumericParseError => "numeric_parse_error",
        };
        f.write_str(name)
    }
}

/// A rejected payload: the reason plus the raw text for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("{reason}: {raw:?}")]
pub struct FrameRejection {
    pub reason: RejectReason,
    /// The offending payload as text (hex dump if it failed to decode)
    pub raw: String,
}

/// Parse a raw notification payload into a [`Sample`].
///
/// Splits on commas, trims whitespace from every field, requires at
/// least 5 fields, and parses fields 2-5 as finite floats. The field
/// count is checked before any numeric parsing, so a short payload is
/// always a [`RejectReason::MalformedFrame`] even when its fields are
/// unparsable.
///
/// On success the sample's `host_timestamp` is stamped here, at parse
/// time, not at any later pipeline stage.
///
/// # Errors
///
/// Returns a [`FrameRejection`] if:
/// - the payload is not valid UTF-8 (`decode_error`)
/// - fewer than 5 comma-delimited fields (`malformed_frame`)
/// - any of fields 2-5 is not a finite number (`numeric_parse_error`)
///
/// # Examples
///
/// ```
/// use power_logger::frame::parse_frame;
///
/// let sample = parse_frame(b"00:01:30,12.00,1.5,300.0,3600.0").unwrap();
/// assert_eq!(sample.device_timestamp, "00:01:30");
/// assert_eq!(sample.bus_voltage, 12.00);
/// ```
pub fn parse_frame(raw: &[u8]) -> Result<Sample, FrameRejection> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text.trim(),
        Err(_) => {
            return Err(FrameRejection {
                reason: RejectReason::DecodeError,
                raw: format!("{:02X?}", raw),
            });
        }
    };

    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    if fields.len() < 5 {
        return Err(FrameRejection {
            reason: RejectReason::MalformedFrame,
            raw: text.to_string(),
        });
    }

    // Fields beyond the first five are ignored
    let mut values = [0.0f64; 4];
    for (value, field) in values.iter_mut().zip(&fields[1..5]) {
        match field.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => *value = parsed,
            _ => {
                return Err(FrameRejection {
                    reason: RejectReason::NumericParseError,
                    raw: text.to_string(),
                });
            }
        }
    }

    Ok(Sample {
        device_timestamp: fields[0].to_string(),
        host_timestamp: Local::now(),
        bus_voltage: values[0],
        shunt_voltage_mv: values[1],
        current_ma: values[2],
        power_mw: values[3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_payload() {
        let sample = parse_frame(b"T1,12.00,1.5,300.0,3600.0").unwrap();
        assert_eq!(sample.device_timestamp, "T1");
        assert_eq!(sample.bus_voltage, 12.00);
        assert_eq!(sample.shunt_voltage_mv, 1.5);
        assert_eq!(sample.current_ma, 300.0);
        assert_eq!(sample.power_mw, 3600.0);
    }

    #[test]
    fn test_too_few_fields_is_malformed() {
        for payload in ["", "T1", "T1,1.0", "T1,1.0,2.0", "T1,1.0,2.0,3.0"] {
            let err = parse_frame(payload.as_bytes()).unwrap_err();
            assert_eq!(
                err.reason,
                RejectReason::MalformedFrame,
                "payload {:?} should be malformed",
                payload
            );
        }
    }

    #[test]
    fn test_field_count_checked_before_numeric_parse() {
        // 4 fields, one of them unparsable: the count check must win
        let err = parse_frame(b"T1,bad,1.5,300.0").unwrap_err();
        assert_eq!(err.reason, RejectReason::MalformedFrame);
    }

    #[test]
    fn test_unparsable_measurement_rejected() {
        let err = parse_frame(b"T1,bad,1.5,300.0,3600.0").unwrap_err();
        assert_eq!(err.reason, RejectReason::NumericParseError);
        assert!(err.raw.contains("bad"));
    }

    #[test]
    fn test_non_finite_measurement_rejected() {
        for payload in [
            "T1,nan,1.5,300.0,3600.0",
            "T1,12.0,inf,300.0,3600.0",
            "T1,12.0,1.5,-inf,3600.0",
        ] {
            let err = parse_frame(payload.as_bytes()).unwrap_err();
            assert_eq!(err.reason, RejectReason::NumericParseError);
        }
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let err = parse_frame(&[0xFF, 0xFE, 0x2C, 0x31]).unwrap_err();
        assert_eq!(err.reason, RejectReason::DecodeError);
    }

    #[test]
    fn test_whitespace_trimmed_from_fields() {
        let sample = parse_frame(b" 00:00:01 , 12.00 ,1.5 , 300.0,3600.0 \r\n").unwrap();
        assert_eq!(sample.device_timestamp, "00:00:01");
        assert_eq!(sample.bus_voltage, 12.00);
        assert_eq!(sample.power_mw, 3600.0);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let sample = parse_frame(b"T1,1.0,2.0,3.0,4.0,garbage,99").unwrap();
        assert_eq!(sample.bus_voltage, 1.0);
        assert_eq!(sample.power_mw, 4.0);
    }

    #[test]
    fn test_device_timestamp_stored_verbatim() {
        // Not a timestamp at all; the parser must not care
        let sample = parse_frame(b"not-a-time,1.0,2.0,3.0,4.0").unwrap();
        assert_eq!(sample.device_timestamp, "not-a-time");
    }

    #[test]
    fn test_log_record_round_trips_measurements() {
        let sample = parse_frame(b"T1,12.00,1.5,300.125,3600.0625").unwrap();
        let record = sample.log_record();

        // Reparse the formatted record as a fresh payload
        let payload = format!(
            "{},{},{},{},{}",
            record[0], record[2], record[3], record[4], record[5]
        );
        let reparsed = parse_frame(payload.as_bytes()).unwrap();
        assert_eq!(reparsed.bus_voltage, sample.bus_voltage);
        assert_eq!(reparsed.shunt_voltage_mv, sample.shunt_voltage_mv);
        assert_eq!(reparsed.current_ma, sample.current_ma);
        assert_eq!(reparsed.power_mw, sample.power_mw);
    }

    #[test]
    fn test_rejection_display_names() {
        assert_eq!(RejectReason::DecodeError.to_string(), "decode_error");
        assert_eq!(RejectReason::MalformedFrame.to_string(), "malformed_frame");
        assert_eq!(
            RejectReason::NumericParseError.to_string(),
            "numeric_parse_error"
        );
    }
}
