//! Argument vectors for each kind of external tool run.
//!
//! Every stage describes what it wants as a small options struct; the
//! [`CommandBuilder`] is the only place that knows ffmpeg/ffprobe flag spelling.

use std::path::Path;

use super::config::EncoderConfig;
use crate::audio::{AudioMode, AudioTrim};
use crate::trim::TrimWindow;

/// Which of the two video passes to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPass {
    /// First pass: gathers statistics, output is thrown away.
    Stats,
    /// Second pass: encodes at the allocated bitrate.
    Encode { bitrate_kbps: u64 },
}

impl VideoPass {
    fn number(&self) -> &'static str {
        match self {
            Self::Stats => "1",
            Self::Encode { .. } => "2",
        }
    }
}

/// Options for the audio pass.
#[derive(Debug, Clone, Copy)]
pub struct AudioPassOptions<'a> {
    pub source: &'a Path,
    pub trim: &'a AudioTrim,
    pub mode: &'a AudioMode,
    pub output: &'a Path,
}

/// Options for either video pass.
#[derive(Debug, Clone, Copy)]
pub struct VideoPassOptions<'a> {
    pub input: &'a Path,
    pub window: &'a TrimWindow,
    pub filter: Option<&'a str>,
    pub pass: VideoPass,
    pub passlog_prefix: &'a Path,
    pub output: &'a Path,
}

/// Options for muxing the video and audio artifacts.
#[derive(Debug, Clone, Copy)]
pub struct MuxOptions<'a> {
    pub video: &'a Path,
    pub audio: &'a Path,
    pub size_cap_bytes: Option<u64>,
    pub output: &'a Path,
}

/// Translates stage options into tool argument vectors.
#[derive(Debug, Clone, Copy)]
pub struct CommandBuilder<'a> {
    config: &'a EncoderConfig,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(config: &'a EncoderConfig) -> Self {
        Self { config }
    }

    /// Arguments for ffprobe; the media path is appended by the caller.
    pub fn probe_args() -> Vec<String> {
        [
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Builds ffmpeg arguments for the audio pass.
    pub fn audio_args(&self, opts: &AudioPassOptions<'_>) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            path_arg(opts.source),
            "-vn".to_string(),
            "-sn".to_string(),
        ];

        match opts.mode {
            AudioMode::Copy => {
                args.extend(["-c:a".to_string(), "copy".to_string()]);
            }
            AudioMode::Encode { quality } => {
                args.extend(["-c:a".to_string(), self.config.audio.codec.clone()]);
                if let Some(q) = quality {
                    args.extend(["-q:a".to_string(), q.to_string()]);
                }
            }
        }

        match opts.trim {
            AudioTrim::Window { start, end } => {
                if let Some(start) = start {
                    args.extend(["-ss".to_string(), start.to_string()]);
                }
                if let Some(end) = end {
                    args.extend(["-to".to_string(), end.to_string()]);
                }
            }
            AudioTrim::Duration { length_secs } => {
                args.extend([
                    "-to".to_string(),
                    crate::timecode::format_timestamp(*length_secs),
                ]);
            }
        }

        self.push_common_tail(&mut args, opts.output);
        args
    }

    /// Builds ffmpeg arguments for a video pass.
    pub fn video_pass_args(&self, opts: &VideoPassOptions<'_>) -> Vec<String> {
        let video = &self.config.video;
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            path_arg(opts.input),
            "-an".to_string(),
            "-sn".to_string(),
        ];

        if let Some(start) = opts.window.start {
            args.extend(["-ss".to_string(), start.to_string()]);
        }
        if let Some(end) = opts.window.end {
            args.extend(["-to".to_string(), end.to_string()]);
        }
        if let Some(filter) = opts.filter {
            args.extend(["-vf".to_string(), filter.to_string()]);
        }

        args.extend(["-c:v".to_string(), video.codec.clone()]);
        if let Some(ref strict) = video.strict {
            args.extend(["-strict".to_string(), strict.clone()]);
        }

        if let VideoPass::Encode { bitrate_kbps } = opts.pass {
            args.extend(["-b:v".to_string(), format!("{}k", bitrate_kbps)]);
        }

        if let Some(alt_ref) = video.auto_alt_ref {
            args.extend(["-auto-alt-ref".to_string(), alt_ref.to_string()]);
        }
        if let Some(lag) = video.lag_in_frames {
            args.extend(["-lag-in-frames".to_string(), lag.to_string()]);
        }

        if let VideoPass::Encode { .. } = opts.pass {
            if let Some(ref quality) = video.quality {
                args.extend(["-quality".to_string(), quality.clone()]);
            }
            if let Some(cpu_used) = video.cpu_used {
                args.extend(["-cpu-used".to_string(), cpu_used.to_string()]);
            }
        }

        args.extend([
            "-pass".to_string(),
            opts.pass.number().to_string(),
            "-passlogfile".to_string(),
            path_arg(opts.passlog_prefix),
        ]);

        self.push_common_tail(&mut args, opts.output);
        args
    }

    /// Builds ffmpeg arguments for muxing video and audio without re-encoding.
    pub fn mux_args(&self, opts: &MuxOptions<'_>) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            path_arg(opts.video),
            "-i".to_string(),
            path_arg(opts.audio),
            "-map".to_string(),
            "0:v".to_string(),
            "-map".to_string(),
            "1:a".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
        ];

        if let Some(limit) = opts.size_cap_bytes {
            args.extend(["-fs".to_string(), limit.to_string()]);
        }

        self.push_common_tail(&mut args, opts.output);
        args
    }

    fn push_common_tail(&self, args: &mut Vec<String>, output: &Path) {
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.push(path_arg(output));
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
