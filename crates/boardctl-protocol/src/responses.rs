//! Response parsing for the board protocol.
//!
//! Sensor replies carry labelled integer fields such as `TMP: 235`. The
//! labels may appear anywhere in the reply body; the first occurrence wins.

use std::sync::LazyLock;

use log::trace;
use regex::Regex;

use crate::error::{ProtocolError, ProtocolResult};

static TEMPERATURE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TMP: ([0-9]+)").expect("Invalid temperature regex"));
static HUMIDITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"HUM: ([0-9]+)").expect("Invalid humidity regex"));
static BRIGHTNESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"BRI: ([0-9]+)").expect("Invalid brightness regex"));

/// Divisor applied to `TMP` and `HUM`, which the board reports in tenths.
pub const TENTHS_SCALE: f64 = 10.0;

/// Numeric fields reported by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorField {
    /// `TMP: <tenths of a degree>`
    Temperature,
    /// `HUM: <tenths of a percent>`
    Humidity,
    /// `BRI: <raw units>`
    Brightness,
}

impl SensorField {
    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            SensorField::Temperature => "Temperature",
            SensorField::Humidity => "Humidity",
            SensorField::Brightness => "Brightness",
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            SensorField::Temperature => &*TEMPERATURE_REGEX,
            SensorField::Humidity => &*HUMIDITY_REGEX,
            SensorField::Brightness => &*BRIGHTNESS_REGEX,
        }
    }
}

/// Extract a field's raw numeric value from a reply body.
pub fn extract_field(body: &str, field: SensorField) -> ProtocolResult<f64> {
    extract_with(body, field.regex(), field.name())
}

/// Extract the first capture group of `pattern` from `body` as a number.
///
/// `name` identifies the field in errors.
pub fn extract_with(body: &str, pattern: &Regex, name: &str) -> ProtocolResult<f64> {
    let captures = pattern
        .captures(body)
        .ok_or_else(|| ProtocolError::FieldNotFound(name.to_string()))?;
    let digits = captures
        .get(1)
        .map(|m| m.as_str())
        .ok_or_else(|| ProtocolError::FieldNotFound(name.to_string()))?;

    let value: f64 = digits.parse().map_err(|_| ProtocolError::NumericParse {
        field: name.to_string(),
        value: digits.to_string(),
    })?;
    trace!("extracted {} = {}", name, value);
    Ok(value)
}

/// Parse a `temp_read` reply into `(temperature, humidity)`.
pub fn parse_temp_humidity(body: &str) -> ProtocolResult<(f64, f64)> {
    let temperature = extract_field(body, SensorField::Temperature)? / TENTHS_SCALE;
    let humidity = extract_field(body, SensorField::Humidity)? / TENTHS_SCALE;
    Ok((temperature, humidity))
}

/// Parse a `bri_read` reply into the brightness value.
pub fn parse_brightness(body: &str) -> ProtocolResult<f64> {
    extract_field(body, SensorField::Brightness)
}
