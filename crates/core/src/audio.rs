//! Audio artifact planning and production.
//!
//! Audio is produced before the bitrate is computed because its exact size is
//! subtracted from the budget. Whether a track is produced at all, where it
//! comes from and how it is trimmed is decided here.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::artifacts::PassArtifact;
use crate::encoder::{
    run_stage, AudioPassOptions, CommandBuilder, Encoder, EncoderConfig, EncoderError, Invocation,
};
use crate::pipeline::{PipelineEvent, Stage};
use crate::probe::MediaSource;
use crate::request::{EncodeRequest, RequestError};
use crate::timecode::Timestamp;
use crate::trim::TrimWindow;

/// Quality setting for the audio pass, as given by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AudioQuality {
    /// Pass the source audio through untouched.
    Copy,
    /// Re-encode at this encoder quality level.
    Level(f32),
}

/// Accepted range for [`AudioQuality::Level`] (the libvorbis `-q:a` scale).
pub const AUDIO_QUALITY_RANGE: std::ops::RangeInclusive<f32> = -1.0..=10.0;

impl FromStr for AudioQuality {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("copy") {
            return Ok(Self::Copy);
        }
        let level: f32 = s
            .parse()
            .map_err(|_| RequestError::InvalidAudioQuality(s.to_string()))?;
        if !AUDIO_QUALITY_RANGE.contains(&level) {
            return Err(RequestError::InvalidAudioQuality(s.to_string()));
        }
        Ok(Self::Level(level))
    }
}

impl TryFrom<String> for AudioQuality {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AudioQuality> for String {
    fn from(value: AudioQuality) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => f.write_str("copy"),
            Self::Level(level) => write!(f, "{}", level),
        }
    }
}

/// How the audio artifact is produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AudioMode {
    /// Stream copy.
    Copy,
    /// Lossy re-encode, at the encoder's default quality when `None`.
    Encode { quality: Option<f32> },
}

impl AudioMode {
    pub fn from_quality(quality: Option<AudioQuality>) -> Self {
        match quality {
            Some(AudioQuality::Copy) => Self::Copy,
            Some(AudioQuality::Level(level)) => Self::Encode {
                quality: Some(level),
            },
            None => Self::Encode { quality: None },
        }
    }

    /// File extension for an artifact produced in this mode.
    pub fn extension<'c>(&self, config: &'c EncoderConfig) -> &'c str {
        match self {
            Self::Copy => &config.audio.copy_extension,
            Self::Encode { .. } => &config.audio.extension,
        }
    }
}

/// Time range taken from the audio source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioTrim {
    /// Same boundaries as the video; used when audio comes from the main input.
    Window {
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    },
    /// `[0, length]`; used for an alternate source whose timeline is unrelated.
    Duration { length_secs: f64 },
}

/// Everything needed to produce the audio artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPlan {
    pub source: PathBuf,
    pub uses_alternate_source: bool,
    pub trim: AudioTrim,
    pub mode: AudioMode,
}

/// Whether the output gets an audio track.
pub fn has_audio(request: &EncodeRequest, source: &MediaSource) -> bool {
    !request.no_audio() && (request.audio_source().is_some() || source.has_audio_stream())
}

/// Decides where audio comes from and how it is cut, or `None` for a silent output.
pub fn plan_audio(
    request: &EncodeRequest,
    source: &MediaSource,
    window: &TrimWindow,
) -> Option<AudioPlan> {
    if !has_audio(request, source) {
        return None;
    }

    let mode = AudioMode::from_quality(request.audio_quality());

    let plan = match request.audio_source() {
        Some(alternate) => AudioPlan {
            source: alternate.to_path_buf(),
            uses_alternate_source: true,
            trim: AudioTrim::Duration {
                length_secs: window.length_secs,
            },
            mode,
        },
        None => AudioPlan {
            source: request.input().to_path_buf(),
            uses_alternate_source: false,
            trim: AudioTrim::Window {
                start: window.start,
                end: window.end,
            },
            mode,
        },
    };

    Some(plan)
}

/// Produces the audio artifact for a run.
pub struct AudioAllocator<'a, E: Encoder + ?Sized> {
    encoder: &'a E,
    config: &'a EncoderConfig,
}

impl<'a, E: Encoder + ?Sized> AudioAllocator<'a, E> {
    pub fn new(encoder: &'a E, config: &'a EncoderConfig) -> Self {
        Self { encoder, config }
    }

    /// Runs the audio pass for `plan`, writing to `output`.
    pub async fn allocate(
        &self,
        plan: &AudioPlan,
        output: &Path,
        length_secs: f64,
        progress_tx: Option<&mpsc::Sender<PipelineEvent>>,
    ) -> Result<PassArtifact, EncoderError> {
        let args = CommandBuilder::new(self.config).audio_args(&AudioPassOptions {
            source: &plan.source,
            trim: &plan.trim,
            mode: &plan.mode,
            output,
        });
        let invocation =
            Invocation::new(Stage::Audio, args, output.to_path_buf()).with_duration(length_secs);

        let artifact = run_stage(self.encoder, &invocation, progress_tx).await?;
        info!(
            "Audio artifact {:?}: {} KiB ({})",
            artifact.path,
            artifact.size_kib(),
            match plan.mode {
                AudioMode::Copy => "stream copy",
                AudioMode::Encode { .. } => "re-encoded",
            }
        );
        Ok(artifact)
    }
}
