//! Pipeline stages and the run state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unit of work in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Probe,
    Audio,
    StatsPass,
    Bitrate,
    EncodePass,
    Mux,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Audio => "audio",
            Self::StatsPass => "stats_pass",
            Self::Bitrate => "bitrate",
            Self::EncodePass => "encode_pass",
            Self::Mux => "mux",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run is. Transitions only move forward, one step at a time,
/// or into `Failed` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    Probed,
    AudioAllocated,
    StatsPassDone,
    BitrateComputed,
    EncodePassDone,
    Muxed,
    Cleaned,
    Failed { stage: Stage },
}

impl PipelineState {
    fn ordinal(&self) -> Option<u8> {
        match self {
            Self::Init => Some(0),
            Self::Probed => Some(1),
            Self::AudioAllocated => Some(2),
            Self::StatsPassDone => Some(3),
            Self::BitrateComputed => Some(4),
            Self::EncodePassDone => Some(5),
            Self::Muxed => Some(6),
            Self::Cleaned => Some(7),
            Self::Failed { .. } => None,
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cleaned | Self::Failed { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Cleaned)
    }

    /// Whether `next` is a legal transition from this state.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.ordinal(), next.ordinal()) {
            (_, None) => true,
            (Some(from), Some(to)) => to == from + 1,
            (None, Some(_)) => false,
        }
    }

    /// The stage that moves a run out of this state.
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            Self::Init => Some(Stage::Probe),
            Self::Probed => Some(Stage::Audio),
            Self::AudioAllocated => Some(Stage::StatsPass),
            Self::StatsPassDone => Some(Stage::Bitrate),
            Self::BitrateComputed => Some(Stage::EncodePass),
            Self::EncodePassDone => Some(Stage::Mux),
            Self::Muxed => Some(Stage::Cleanup),
            Self::Cleaned | Self::Failed { .. } => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Probed => f.write_str("probed"),
            Self::AudioAllocated => f.write_str("audio_allocated"),
            Self::StatsPassDone => f.write_str("stats_pass_done"),
            Self::BitrateComputed => f.write_str("bitrate_computed"),
            Self::EncodePassDone => f.write_str("encode_pass_done"),
            Self::Muxed => f.write_str("muxed"),
            Self::Cleaned => f.write_str("cleaned"),
            Self::Failed { stage } => write!(f, "failed({})", stage),
        }
    }
}
