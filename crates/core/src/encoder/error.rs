//! Error types for the encoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while running an external encoder stage.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// The encoder ran but exited unsuccessfully.
    #[error("encoder exited with code {}", display_code(.code))]
    ExitFailure {
        code: Option<i32>,
        stderr: Option<String>,
    },

    /// The encoder reported success but the expected output is absent.
    #[error("expected output file is missing: {path}")]
    MissingArtifact { path: PathBuf },

    /// I/O error while running the stage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

impl EncoderError {
    /// Exit code of a failed encoder run, if that is what happened.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExitFailure { code, .. } => *code,
            _ => None,
        }
    }

    /// Captured encoder error output, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ExitFailure { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
