//! Error types for the probe module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing the source.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Prober binary not found.
    #[error("FFprobe not found at path: {path}")]
    ProberNotFound { path: PathBuf },

    /// The prober ran but failed.
    #[error("Failed to probe media file: {reason}")]
    Failed { reason: String },

    /// The prober output could not be understood.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// More than one audio stream; there is no rule for picking one.
    #[error("source has {count} audio streams (indices {indices:?}); only a single audio stream is supported")]
    MultipleAudioStreams { count: usize, indices: Vec<u32> },

    /// I/O error while running the prober.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Creates a new probe failed error.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Creates a new parse error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }
}
