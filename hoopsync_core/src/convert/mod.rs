//! Per-provider translation of raw payloads into canonical structures.
//!
//! One converter per provider. Conversions are pure transforms; every
//! validation failure is an error rather than a silent default, with
//! one documented exception: blank or absent numeric stat fields are
//! read as zero, because both feeds omit columns for players with no
//! recorded value.

use serde_json::Value;

use crate::error::ConversionError;
use crate::models::{
    CanonicalGame, CanonicalPbpEvent, CanonicalPlayer, CanonicalStatLine, CanonicalTeam,
};

pub mod continental;
pub mod national;

pub use continental::ContinentalFeedConverter;
pub use national::NationalFeedConverter;

/// Converts one provider's raw payloads into canonical structures.
pub trait CanonicalConverter: Send + Sync {
    /// Provider key this converter understands (matches the adapter's).
    fn provider(&self) -> &'static str;

    fn convert_team(&self, raw: &Value) -> Result<CanonicalTeam, ConversionError>;
    fn convert_player(&self, raw: &Value) -> Result<CanonicalPlayer, ConversionError>;
    fn convert_game(&self, raw: &Value) -> Result<CanonicalGame, ConversionError>;
    fn convert_player_stats(&self, raw: &Value) -> Result<CanonicalStatLine, ConversionError>;
    fn convert_pbp_event(&self, raw: &Value) -> Result<CanonicalPbpEvent, ConversionError>;
}

/// Maximum plausible player height. Anything above this is a payload
/// defect (meters/centimeters confusion, typo), not a tall player.
pub const MAX_HEIGHT_CM: i32 = 250;
pub const MIN_HEIGHT_CM: i32 = 120;

/// Required non-empty string field.
pub(crate) fn req_str<'a>(raw: &'a Value, field: &str) -> Result<&'a str, ConversionError> {
    match raw.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim()),
        _ => Err(ConversionError::missing(field)),
    }
}

/// Optional string field; empty strings read as absent.
pub(crate) fn opt_str(raw: &Value, field: &str) -> Option<String> {
    raw.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Required id field, tolerating numeric or string encodings.
pub(crate) fn req_id(raw: &Value, field: &str) -> Result<String, ConversionError> {
    match raw.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ConversionError::missing(field)),
    }
}

/// Numeric stat field delivered as a number or a numeric string.
/// Blank or absent reads as zero (the documented exception); anything
/// else non-numeric is an error.
pub(crate) fn int_field(raw: &Value, field: &str) -> Result<i32, ConversionError> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|v| v as i32)
            .ok_or_else(|| ConversionError::out_of_range(field, "not an integer")),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Ok(0)
            } else {
                s.parse::<i32>()
                    .map_err(|_| ConversionError::out_of_range(field, format!("'{s}' is not numeric")))
            }
        }
        Some(other) => Err(ConversionError::out_of_range(
            field,
            format!("unexpected value {other}"),
        )),
    }
}

/// Optional jersey number; malformed values read as absent rather than
/// failing the record, since jerseys are only a secondary match key.
pub(crate) fn opt_jersey(raw: &Value, field: &str) -> Option<i32> {
    match raw.get(field) {
        Some(Value::Number(n)) => n.as_i64().map(|v| v as i32),
        Some(Value::String(s)) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

/// "MM:SS" game-clock or minutes-played string to whole seconds.
pub(crate) fn clock_to_seconds(field: &str, value: &str) -> Result<i32, ConversionError> {
    let value = value.trim();
    let (minutes, seconds) = value
        .split_once(':')
        .ok_or_else(|| ConversionError::out_of_range(field, format!("'{value}' is not MM:SS")))?;
    let minutes: i32 = minutes
        .trim()
        .parse()
        .map_err(|_| ConversionError::out_of_range(field, format!("bad minutes in '{value}'")))?;
    let seconds: i32 = seconds
        .trim()
        .parse()
        .map_err(|_| ConversionError::out_of_range(field, format!("bad seconds in '{value}'")))?;
    if !(0..60).contains(&seconds) || minutes < 0 {
        return Err(ConversionError::out_of_range(
            field,
            format!("'{value}' out of clock range"),
        ));
    }
    Ok(minutes * 60 + seconds)
}

/// Height in meters as a decimal string ("2.06") to centimeters.
pub(crate) fn height_meters_to_cm(field: &str, value: &str) -> Result<i32, ConversionError> {
    let meters: f64 = value
        .trim()
        .parse()
        .map_err(|_| ConversionError::out_of_range(field, format!("'{value}' is not a height")))?;
    let cm = (meters * 100.0).round() as i32;
    validate_height_cm(field, cm)
}

pub(crate) fn validate_height_cm(field: &str, cm: i32) -> Result<i32, ConversionError> {
    if (MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&cm) {
        Ok(cm)
    } else {
        Err(ConversionError::out_of_range(
            field,
            format!("{cm} cm is not a plausible height"),
        ))
    }
}
