//! Timestamp parsing and formatting.
//!
//! Trim boundaries are accepted either as a bare number of seconds (`"90"`,
//! `"12.5"`) or as `HH:MM:SS[.fraction]`. Fractional seconds are preserved so
//! that sub-second trims stay accurate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A timestamp string could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized timestamp format: {input:?} ({reason})")]
pub struct TimeFormatError {
    pub input: String,
    pub reason: String,
}

impl TimeFormatError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parses a timestamp into seconds.
pub fn parse_timestamp(s: &str) -> Result<f64, TimeFormatError> {
    let trimmed = s.trim();
    let parts: Vec<&str> = trimmed.split(':').collect();

    let seconds = match parts.as_slice() {
        [secs] => parse_seconds(s, secs)?,
        [hours, minutes, secs] => {
            let hours: u64 = hours
                .parse()
                .map_err(|_| TimeFormatError::new(s, "hours must be a whole number"))?;
            let minutes: u64 = minutes
                .parse()
                .map_err(|_| TimeFormatError::new(s, "minutes must be a whole number"))?;
            let secs = parse_seconds(s, secs)?;
            let whole = hours
                .checked_mul(3600)
                .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
                .ok_or_else(|| TimeFormatError::new(s, "timestamp out of range"))?;
            whole as f64 + secs
        }
        _ => {
            return Err(TimeFormatError::new(
                s,
                format!("expected 1 or 3 fields, got {}", parts.len()),
            ))
        }
    };

    Ok(seconds)
}

fn parse_seconds(input: &str, field: &str) -> Result<f64, TimeFormatError> {
    let value: f64 = field
        .parse()
        .map_err(|_| TimeFormatError::new(input, "seconds must be a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(TimeFormatError::new(
            input,
            "seconds must be finite and non-negative",
        ));
    }
    Ok(value)
}

/// Formats seconds as `HH:MM:SS.mmm`.
///
/// Hours are not wrapped at 24 and grow past two digits when needed.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let minutes = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, ms)
}

/// A validated trim boundary, in seconds from the start of the media.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(f64);

impl Timestamp {
    pub fn from_secs(seconds: f64) -> Result<Self, TimeFormatError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(TimeFormatError::new(
                &seconds.to_string(),
                "seconds must be finite and non-negative",
            ));
        }
        Ok(Self(seconds))
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }
}

impl FromStr for Timestamp {
    type Err = TimeFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_timestamp(s).map(Self)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TimeFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_timestamp(self.0))
    }
}
