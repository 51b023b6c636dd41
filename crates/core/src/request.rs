//! The immutable description of one encode run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioQuality;
use crate::timecode::Timestamp;

/// Default size budget when none is given, in KiB.
pub const DEFAULT_TARGET_KIB: u64 = 10_000;

/// Largest budget whose byte count still fits in a `u64`.
pub const MAX_TARGET_KIB: u64 = u64::MAX / 1024;

/// Invalid caller input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("input path is empty")]
    EmptyInput,

    #[error("target size must be a positive number of KiB")]
    ZeroTargetSize,

    #[error("target size of {0} KiB is too large (at most {MAX_TARGET_KIB} KiB)")]
    TargetTooLarge(u64),

    #[error("video filter expression is empty")]
    EmptyFilter,

    #[error("invalid audio quality {0:?}: expected \"copy\" or a number between -1 and 10")]
    InvalidAudioQuality(String),

    #[error(transparent)]
    Timestamp(#[from] crate::timecode::TimeFormatError),
}

/// What to encode and how large the result may be.
///
/// Built once through [`EncodeRequest::builder`] and never modified.
/// Deserialization goes through the same validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRequest")]
pub struct EncodeRequest {
    input: PathBuf,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    target_kib: u64,
    video_filter: Option<String>,
    audio_source: Option<PathBuf>,
    audio_quality: Option<AudioQuality>,
    no_audio: bool,
}

impl EncodeRequest {
    pub fn builder(input: impl Into<PathBuf>) -> EncodeRequestBuilder {
        EncodeRequestBuilder::new(input)
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn start(&self) -> Option<Timestamp> {
        self.start
    }

    pub fn end(&self) -> Option<Timestamp> {
        self.end
    }

    pub fn target_kib(&self) -> u64 {
        self.target_kib
    }

    /// The size budget in bytes.
    pub fn target_bytes(&self) -> u64 {
        self.target_kib.saturating_mul(1024)
    }

    pub fn video_filter(&self) -> Option<&str> {
        self.video_filter.as_deref()
    }

    pub fn audio_source(&self) -> Option<&Path> {
        self.audio_source.as_deref()
    }

    pub fn audio_quality(&self) -> Option<AudioQuality> {
        self.audio_quality
    }

    pub fn no_audio(&self) -> bool {
        self.no_audio
    }
}

/// Builder for [`EncodeRequest`].
#[derive(Debug, Clone)]
pub struct EncodeRequestBuilder {
    input: PathBuf,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    target_kib: u64,
    video_filter: Option<String>,
    audio_source: Option<PathBuf>,
    audio_quality: Option<AudioQuality>,
    no_audio: bool,
}

impl EncodeRequestBuilder {
    fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            start: None,
            end: None,
            target_kib: DEFAULT_TARGET_KIB,
            video_filter: None,
            audio_source: None,
            audio_quality: None,
            no_audio: false,
        }
    }

    pub fn start(mut self, start: Timestamp) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: Timestamp) -> Self {
        self.end = Some(end);
        self
    }

    /// Sets trim boundaries from optional text, as they arrive from the CLI.
    pub fn trim_str(mut self, start: Option<&str>, end: Option<&str>) -> Result<Self, RequestError> {
        self.start = start.map(str::parse::<Timestamp>).transpose()?;
        self.end = end.map(str::parse::<Timestamp>).transpose()?;
        Ok(self)
    }

    pub fn target_kib(mut self, kib: u64) -> Self {
        self.target_kib = kib;
        self
    }

    pub fn video_filter(mut self, filter: impl Into<String>) -> Self {
        self.video_filter = Some(filter.into());
        self
    }

    pub fn audio_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_source = Some(path.into());
        self
    }

    pub fn audio_quality(mut self, quality: AudioQuality) -> Self {
        self.audio_quality = Some(quality);
        self
    }

    pub fn no_audio(mut self, no_audio: bool) -> Self {
        self.no_audio = no_audio;
        self
    }

    pub fn build(self) -> Result<EncodeRequest, RequestError> {
        if self.input.as_os_str().is_empty() {
            return Err(RequestError::EmptyInput);
        }
        if self.target_kib == 0 {
            return Err(RequestError::ZeroTargetSize);
        }
        if self.target_kib > MAX_TARGET_KIB {
            return Err(RequestError::TargetTooLarge(self.target_kib));
        }
        if matches!(self.video_filter.as_deref(), Some(f) if f.trim().is_empty()) {
            return Err(RequestError::EmptyFilter);
        }

        Ok(EncodeRequest {
            input: self.input,
            start: self.start,
            end: self.end,
            target_kib: self.target_kib,
            video_filter: self.video_filter,
            audio_source: self.audio_source,
            audio_quality: self.audio_quality,
            no_audio: self.no_audio,
        })
    }
}

#[derive(Deserialize)]
struct RawRequest {
    input: PathBuf,
    #[serde(default)]
    start: Option<Timestamp>,
    #[serde(default)]
    end: Option<Timestamp>,
    #[serde(default = "default_target_kib")]
    target_kib: u64,
    #[serde(default)]
    video_filter: Option<String>,
    #[serde(default)]
    audio_source: Option<PathBuf>,
    #[serde(default)]
    audio_quality: Option<AudioQuality>,
    #[serde(default)]
    no_audio: bool,
}

fn default_target_kib() -> u64 {
    DEFAULT_TARGET_KIB
}

impl TryFrom<RawRequest> for EncodeRequest {
    type Error = RequestError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        EncodeRequestBuilder {
            input: raw.input,
            start: raw.start,
            end: raw.end,
            target_kib: raw.target_kib,
            video_filter: raw.video_filter,
            audio_source: raw.audio_source,
            audio_quality: raw.audio_quality,
            no_audio: raw.no_audio,
        }
        .build()
    }
}
