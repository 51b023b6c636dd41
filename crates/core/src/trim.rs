//! Resolution of the encode window from optional trim boundaries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timecode::Timestamp;

/// The requested trim boundaries leave nothing to encode.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid trim window: resulting length is {length_secs}s (start: {start:?}, end: {end:?}, source duration: {total_secs}s)")]
pub struct TrimError {
    pub length_secs: f64,
    pub total_secs: f64,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

/// The resolved portion of the source that will be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimWindow {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub length_secs: f64,
}

impl TrimWindow {
    /// Resolves the encode length.
    ///
    /// A lone `end` is an absolute duration measured from zero, not an offset
    /// from the end of the source: `resolve(120, None, Some(30s))` is 30 seconds
    /// long.
    pub fn resolve(
        total_secs: f64,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Self, TrimError> {
        let length_secs = match (start, end) {
            (None, None) => total_secs,
            (None, Some(end)) => end.as_secs(),
            (Some(start), None) => total_secs - start.as_secs(),
            (Some(start), Some(end)) => end.as_secs() - start.as_secs(),
        };

        if !length_secs.is_finite() || length_secs <= 0.0 {
            return Err(TrimError {
                length_secs,
                total_secs,
                start,
                end,
            });
        }

        Ok(Self {
            start,
            end,
            length_secs,
        })
    }

    /// Whether any boundary was supplied.
    pub fn is_trimmed(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Option<Timestamp> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_no_bounds_uses_total() {
        let window = TrimWindow::resolve(120.0, None, None).unwrap();
        assert_eq!(window.length_secs, 120.0);
        assert!(!window.is_trimmed());
    }

    #[test]
    fn test_start_only() {
        let window = TrimWindow::resolve(120.0, ts("00:01:00"), None).unwrap();
        assert_eq!(window.length_secs, 60.0);
    }

    #[test]
    fn test_end_only_is_absolute_duration() {
        let window = TrimWindow::resolve(120.0, None, ts("00:00:30")).unwrap();
        assert_eq!(window.length_secs, 30.0);
        assert!(window.is_trimmed());
    }

    #[test]
    fn test_start_and_end() {
        let window = TrimWindow::resolve(120.0, ts("00:00:10"), ts("00:01:00")).unwrap();
        assert_eq!(window.length_secs, 50.0);
    }

    #[test]
    fn test_end_before_start_fails() {
        let err = TrimWindow::resolve(120.0, ts("00:01:00"), ts("00:00:10")).unwrap_err();
        assert_eq!(err.length_secs, -50.0);
    }

    #[test]
    fn test_start_past_duration_fails() {
        assert!(TrimWindow::resolve(120.0, ts("120"), None).is_err());
        assert!(TrimWindow::resolve(120.0, ts("00:05:00"), None).is_err());
    }

    #[test]
    fn test_zero_duration_source_fails() {
        assert!(TrimWindow::resolve(0.0, None, None).is_err());
    }
}
