//! Configuration for the ffmpeg/ffprobe tool layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the external prober and encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional ffmpeg arguments appended before the output path of every stage.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,

    /// Video pass settings.
    #[serde(default)]
    pub video: VideoCodecConfig,

    /// Audio pass settings.
    #[serde(default)]
    pub audio: AudioCodecConfig,
}

/// Settings shared by both video passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCodecConfig {
    /// ffmpeg video encoder name.
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Value for `-strict`, if any.
    #[serde(default = "default_strict")]
    pub strict: Option<String>,

    /// Value for `-auto-alt-ref`.
    #[serde(default = "default_auto_alt_ref")]
    pub auto_alt_ref: Option<u32>,

    /// Value for `-lag-in-frames`.
    #[serde(default = "default_lag_in_frames")]
    pub lag_in_frames: Option<u32>,

    /// Value for `-quality` on the encode pass.
    #[serde(default = "default_quality")]
    pub quality: Option<String>,

    /// Value for `-cpu-used` on the encode pass.
    #[serde(default = "default_cpu_used")]
    pub cpu_used: Option<i32>,

    /// Container extension for the video artifacts and final output.
    #[serde(default = "default_video_extension")]
    pub extension: String,
}

/// Settings for the audio pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioCodecConfig {
    /// ffmpeg audio encoder name used when re-encoding.
    #[serde(default = "default_audio_codec")]
    pub codec: String,

    /// Extension of the re-encoded audio artifact.
    #[serde(default = "default_audio_extension")]
    pub extension: String,

    /// Extension of the stream-copied audio artifact. Must accept any codec.
    #[serde(default = "default_copy_extension")]
    pub copy_extension: String,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "warning".to_string()
}

fn default_video_codec() -> String {
    "libvpx".to_string()
}

fn default_strict() -> Option<String> {
    Some("experimental".to_string())
}

fn default_auto_alt_ref() -> Option<u32> {
    Some(1)
}

fn default_lag_in_frames() -> Option<u32> {
    Some(20)
}

fn default_quality() -> Option<String> {
    Some("good".to_string())
}

fn default_cpu_used() -> Option<i32> {
    Some(0)
}

fn default_video_extension() -> String {
    "webm".to_string()
}

fn default_audio_codec() -> String {
    "libvorbis".to_string()
}

fn default_audio_extension() -> String {
    "ogg".to_string()
}

fn default_copy_extension() -> String {
    "mka".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
            video: VideoCodecConfig::default(),
            audio: AudioCodecConfig::default(),
        }
    }
}

impl Default for VideoCodecConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            strict: default_strict(),
            auto_alt_ref: default_auto_alt_ref(),
            lag_in_frames: default_lag_in_frames(),
            quality: default_quality(),
            cpu_used: default_cpu_used(),
            extension: default_video_extension(),
        }
    }
}

impl Default for AudioCodecConfig {
    fn default() -> Self {
        Self {
            codec: default_audio_codec(),
            extension: default_audio_extension(),
            copy_extension: default_copy_extension(),
        }
    }
}

impl EncoderConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the ffmpeg log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.ffmpeg_log_level = level.into();
        self
    }
}
