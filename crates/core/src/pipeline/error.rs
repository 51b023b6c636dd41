//! Error type for pipeline runs.

use std::path::PathBuf;
use thiserror::Error;

use super::state::{PipelineState, Stage};
use crate::bitrate::BitrateError;
use crate::encoder::EncoderError;
use crate::probe::ProbeError;
use crate::trim::TrimError;

/// Why a run stopped. Every variant maps to the stage it happened in.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Probing the source failed or the source is unsupported.
    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),

    /// The trim boundaries leave nothing to encode.
    #[error(transparent)]
    Trim(#[from] TrimError),

    /// No positive video bitrate fits the budget.
    #[error(transparent)]
    Bitrate(#[from] BitrateError),

    /// An encoder stage failed.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: EncoderError,
    },

    /// A file operation of the pipeline itself failed.
    #[error("{stage} stage failed on {path}: {source}")]
    Workspace {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was started from a state it cannot run from.
    #[error("pipeline cannot run from state {0}")]
    InvalidState(PipelineState),
}

impl PipelineError {
    pub(crate) fn stage(stage: Stage, source: EncoderError) -> Self {
        Self::Stage { stage, source }
    }

    /// The stage the error belongs to.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Probe(_) | Self::Trim(_) => Some(Stage::Probe),
            Self::Bitrate(_) => Some(Stage::Bitrate),
            Self::Stage { stage, .. } | Self::Workspace { stage, .. } => Some(*stage),
            Self::InvalidState(_) => None,
        }
    }
}
