//! Value types exchanged with the board.

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ProtocolError, ProtocolResult};

/// Largest magnitude below which every whole `f64` is an exact integer.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// One environment reading, assembled from `temp_read` and `bri_read`.
///
/// Whole values serialize as JSON integers (`77`, not `77.0`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvReading {
    /// Temperature in degrees Celsius.
    #[serde(serialize_with = "serialize_measurement")]
    pub temperature: f64,
    /// Relative humidity in percent.
    #[serde(serialize_with = "serialize_measurement")]
    pub humidity: f64,
    /// Brightness in raw sensor units.
    #[serde(serialize_with = "serialize_measurement")]
    pub brightness: f64,
}

fn serialize_measurement<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < MAX_EXACT_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// An infrared signal to emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrSignal {
    interval: u32,
    pattern: String,
}

impl IrSignal {
    /// Create a signal.
    ///
    /// The pattern is sent as a single line, so it must be non-empty and
    /// must not contain line breaks.
    pub fn new(interval: u32, pattern: impl Into<String>) -> ProtocolResult<Self> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(ProtocolError::InvalidArgument(
                "pattern must not be empty".to_string(),
            ));
        }
        if pattern.contains(['\n', '\r']) {
            return Err(ProtocolError::InvalidArgument(format!(
                "pattern must be a single line: {:?}",
                pattern
            )));
        }
        Ok(IrSignal { interval, pattern })
    }

    /// Parse a signal from command-line text.
    pub fn parse(interval: &str, pattern: &str) -> ProtocolResult<Self> {
        let interval: u32 = interval.trim().parse().map_err(|_| {
            ProtocolError::InvalidArgument(format!("invalid interval: {:?}", interval))
        })?;
        Self::new(interval, pattern)
    }

    /// Transmission interval in board timing units.
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Encoded signal pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signal() {
        let signal = IrSignal::parse("500", "1010").unwrap();
        assert_eq!(signal.interval(), 500);
        assert_eq!(signal.pattern(), "1010");
    }

    #[test]
    fn test_parse_rejects_bad_interval() {
        for bad in ["", "abc", "-1", "1.5", "99999999999"] {
            assert!(
                matches!(IrSignal::parse(bad, "1010"), Err(ProtocolError::InvalidArgument(_))),
                "interval {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_rejects_bad_pattern() {
        assert!(IrSignal::new(10, "").is_err());
        assert!(IrSignal::new(10, "10\nbri_read").is_err());
    }

    #[test]
    fn test_env_reading_serializes_field_names() {
        let reading = EnvReading {
            temperature: 23.5,
            humidity: 41.2,
            brightness: 77.0,
        };
        let json = serde_json::to_value(reading).unwrap();
        assert_eq!(json["temperature"], 23.5);
        assert_eq!(json["humidity"], 41.2);
        assert_eq!(json["brightness"], 77.0);
    }

    #[test]
    fn test_whole_values_serialize_as_integers() {
        let reading = EnvReading {
            temperature: 20.0,
            humidity: 41.2,
            brightness: 77.0,
        };
        assert_eq!(
            serde_json::to_string(&reading).unwrap(),
            r#"{"temperature":20,"humidity":41.2,"brightness":77}"#
        );

        let back: EnvReading =
            serde_json::from_str(r#"{"temperature":20,"humidity":41.2,"brightness":77}"#)
                .unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn test_non_finite_values_are_not_integers() {
        let reading = EnvReading {
            temperature: f64::NAN,
            humidity: 1e300,
            brightness: -0.5,
        };
        let json = serde_json::to_string(&reading).unwrap();
        // serde_json writes non-finite floats as null.
        assert!(json.starts_with(r#"{"temperature":null,"#), "{json}");
        assert!(json.ends_with(r#""brightness":-0.5}"#), "{json}");
    }
}
