//! FFmpeg/FFprobe subprocess implementation of the tool traits.

use async_trait::async_trait;
use regex_lite::Regex;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::debug;

use super::command::CommandBuilder;
use super::config::EncoderConfig;
use super::error::EncoderError;
use super::traits::{Encoder, Prober};
use super::types::{Invocation, ToolExit};
use crate::pipeline::PipelineEvent;
use crate::probe::{ProbeError, ProbeReport};

/// Keeps at most this many captured error lines per run.
const MAX_ERROR_LINES: usize = 40;

/// FFmpeg-based prober and encoder.
///
/// Child processes are spawned with `kill_on_drop`, so dropping a running
/// stage future (for example on Ctrl+C) terminates the encoder.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    config: EncoderConfig,
}

impl FfmpegTool {
    /// Creates a new tool with the given configuration.
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Creates a tool with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EncoderConfig::default())
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Checks that both executables can be started.
    pub async fn validate(&self) -> Result<(), EncoderError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EncoderError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(EncoderError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EncoderError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(EncoderError::Io(e));
        }

        Ok(())
    }
}

/// Incremental parser for `-progress pipe:2` output.
struct ProgressParser {
    time_regex: Option<Regex>,
    speed_regex: Option<Regex>,
    current_time: f64,
    current_speed: Option<String>,
}

impl ProgressParser {
    fn new() -> Self {
        Self {
            time_regex: Regex::new(r"out_time_ms=(\d+)").ok(),
            speed_regex: Regex::new(r"speed=\s*(\d+\.?\d*)x").ok(),
            current_time: 0.0,
            current_speed: None,
        }
    }

    fn feed(&mut self, line: &str) {
        if let Some(ref re) = self.time_regex {
            if let Some(caps) = re.captures(line) {
                if let Some(Ok(us)) = caps.get(1).map(|m| m.as_str().parse::<f64>()) {
                    // out_time_ms is reported in microseconds
                    self.current_time = us / 1_000_000.0;
                }
            }
        }

        if let Some(ref re) = self.speed_regex {
            if let Some(caps) = re.captures(line) {
                if let Some(speed) = caps.get(1) {
                    self.current_speed = Some(format!("{}x", speed.as_str()));
                }
            }
        }
    }

    fn percent(&self, duration_secs: Option<f64>) -> f32 {
        match duration_secs {
            Some(dur) if dur > 0.0 => (self.current_time / dur * 100.0).min(100.0) as f32,
            _ => 0.0,
        }
    }
}

fn is_error_line(line: &str) -> bool {
    line.contains("Error") || line.contains("error") || line.contains("Invalid")
}

#[async_trait]
impl Prober for FfmpegTool {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeReport, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args(CommandBuilder::probe_args())
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::ProberNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    ProbeError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ProbeError::failed(format!(
                "ffprobe exited with code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        ProbeReport::from_json(&stdout)
    }
}

#[async_trait]
impl Encoder for FfmpegTool {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn run(
        &self,
        invocation: &Invocation,
        progress_tx: Option<&mpsc::Sender<PipelineEvent>>,
    ) -> Result<ToolExit, EncoderError> {
        debug!(
            "{}",
            invocation.command_line(&self.config.ffmpeg_path.to_string_lossy())
        );

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EncoderError::Io(e)
                }
            })?;

        let mut error_lines: Vec<String> = Vec::new();
        let mut parser = ProgressParser::new();

        if let Some(stderr) = child.stderr.take() {
            let mut reader = BufReader::new(stderr).split(b'\n');
            let mut last_progress_send = Instant::now();
            let progress_interval = Duration::from_millis(500);

            // ffmpeg echoes metadata and paths verbatim, so lines are not always UTF-8
            while let Some(raw) = reader.next_segment().await? {
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches('\r');
                if is_error_line(line) {
                    if error_lines.len() == MAX_ERROR_LINES {
                        error_lines.remove(0);
                    }
                    error_lines.push(line.to_string());
                }

                parser.feed(line);

                if let Some(tx) = progress_tx {
                    if last_progress_send.elapsed() >= progress_interval {
                        let _ = tx.try_send(PipelineEvent::StageProgress {
                            stage: invocation.stage,
                            percent: parser.percent(invocation.expected_duration_secs),
                            time_secs: parser.current_time,
                            speed: parser.current_speed.clone(),
                        });
                        last_progress_send = Instant::now();
                    }
                }
            }
        }

        let status = child.wait().await?;

        Ok(ToolExit {
            code: status.code(),
            stderr: if error_lines.is_empty() {
                None
            } else {
                Some(error_lines.join("\n"))
            },
        })
    }
}
