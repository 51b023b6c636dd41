//! Types for the probe module.

use serde::{Deserialize, Serialize};

use super::error::ProbeError;
use crate::timecode::parse_timestamp;

/// Raw prober output, shaped like `ffprobe -print_format json -show_format -show_streams`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: ProbeFormat,
}

/// One stream entry of the prober output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeStream {
    pub index: u32,
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub codec_name: Option<String>,
}

/// Container section of the prober output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeFormat {
    /// Duration in seconds, as the decimal string ffprobe reports.
    #[serde(default)]
    pub duration: Option<String>,
}

impl ProbeReport {
    /// Parses ffprobe JSON output.
    pub fn from_json(output: &str) -> Result<Self, ProbeError> {
        serde_json::from_str(output)
            .map_err(|e| ProbeError::parse(format!("Failed to parse ffprobe output: {}", e)))
    }
}

/// Broad kind of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecType {
    Video,
    Audio,
    Other,
}

impl From<&str> for CodecType {
    fn from(value: &str) -> Self {
        match value {
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Other,
        }
    }
}

/// A stream of the source media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub index: u32,
    pub codec_type: CodecType,
    pub codec_name: Option<String>,
}

/// Probed source metadata.
///
/// Holds at most one audio stream; construction fails otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    duration_secs: f64,
    streams: Vec<StreamInfo>,
}

impl MediaSource {
    pub fn new(duration_secs: f64, streams: Vec<StreamInfo>) -> Result<Self, ProbeError> {
        let audio_indices: Vec<u32> = streams
            .iter()
            .filter(|s| s.codec_type == CodecType::Audio)
            .map(|s| s.index)
            .collect();

        if audio_indices.len() > 1 {
            return Err(ProbeError::MultipleAudioStreams {
                count: audio_indices.len(),
                indices: audio_indices,
            });
        }

        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(ProbeError::parse(format!(
                "invalid source duration: {}",
                duration_secs
            )));
        }

        Ok(Self {
            duration_secs,
            streams,
        })
    }

    /// Builds a source from raw prober output.
    pub fn from_report(report: ProbeReport) -> Result<Self, ProbeError> {
        let duration = report
            .format
            .duration
            .as_deref()
            .ok_or_else(|| ProbeError::parse("format.duration is missing"))?;
        let duration_secs = parse_timestamp(duration)
            .map_err(|e| ProbeError::parse(format!("format.duration: {}", e)))?;

        let streams = report
            .streams
            .into_iter()
            .map(|s| StreamInfo {
                index: s.index,
                codec_type: s.codec_type.as_deref().map(CodecType::from).unwrap_or(CodecType::Other),
                codec_name: s.codec_name,
            })
            .collect();

        Self::new(duration_secs, streams)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    /// The single audio stream, if present.
    pub fn audio_stream(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|s| s.codec_type == CodecType::Audio)
    }

    pub fn has_audio_stream(&self) -> bool {
        self.audio_stream().is_some()
    }

    pub fn video_stream(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|s| s.codec_type == CodecType::Video)
    }
}
