//! Types for the pipeline module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::state::Stage;
use crate::artifacts::PassArtifact;
use crate::bitrate::BitratePlan;
use crate::cleanup::CleanupReport;
use crate::probe::MediaSource;
use crate::trim::TrimWindow;

/// Progress notification emitted while a run executes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A stage began.
    StageStarted { stage: Stage },
    /// An encoder reported progress within a stage.
    StageProgress {
        stage: Stage,
        /// 0.0 to 100.0.
        percent: f32,
        /// Media time processed so far.
        time_secs: f64,
        /// Encoder speed, e.g. `"1.5x"`.
        speed: Option<String>,
    },
    /// A stage finished.
    StageCompleted { stage: Stage, elapsed_ms: u64 },
    /// The output will have no audio track.
    AudioSkipped,
    /// The video bitrate was allocated.
    BitrateComputed { plan: BitratePlan },
    /// The run finished and produced `output`.
    Completed { output: PathBuf, size_bytes: u64 },
    /// The run failed at `stage`.
    Failed { stage: Stage, error: String },
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Final output file.
    pub output: PathBuf,
    /// Size of the final output.
    pub output_size_bytes: u64,
    /// Bitrate allocation used for the encode pass.
    pub plan: BitratePlan,
    /// Probed source.
    pub source: MediaSource,
    /// Encoded window.
    pub window: TrimWindow,
    /// Audio artifact, when the output has audio.
    pub audio: Option<PassArtifact>,
    /// What cleanup removed, empty when intermediates are kept.
    pub cleanup: CleanupReport,
    /// Wall time of the run.
    pub elapsed_ms: u64,
}

impl PipelineReport {
    /// Whether the output fits the budget the plan was computed for.
    pub fn within_target(&self) -> bool {
        self.output_size_bytes <= self.plan.target_kib.saturating_mul(1024)
    }
}
