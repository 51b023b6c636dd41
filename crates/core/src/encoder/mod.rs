//! External tool layer: ffprobe for metadata, ffmpeg for every encode stage.
//!
//! The pipeline only talks to the [`Prober`] and [`Encoder`] traits. Stage
//! argument vectors are produced by [`CommandBuilder`] from typed options, and
//! [`FfmpegTool`] runs them as child processes.
//!
//! # Example
//!
//! ```ignore
//! use sizecap_core::encoder::{CommandBuilder, Encoder, FfmpegTool, Invocation, MuxOptions};
//!
//! let tool = FfmpegTool::with_defaults();
//! tool.validate().await?;
//!
//! let args = CommandBuilder::new(tool.config()).mux_args(&MuxOptions {
//!     video: Path::new("clip_v.webm"),
//!     audio: Path::new("clip_a.ogg"),
//!     size_cap_bytes: Some(10_240_000),
//!     output: Path::new("clip_converted.webm"),
//! });
//! let exit = tool
//!     .run(&Invocation::new(Stage::Mux, args, "clip_converted.webm".into()), None)
//!     .await?;
//! assert!(exit.is_success());
//! ```

mod command;
mod config;
mod error;
mod ffmpeg;
mod stage;
mod traits;
mod types;

pub use command::{AudioPassOptions, CommandBuilder, MuxOptions, VideoPass, VideoPassOptions};
pub use config::{AudioCodecConfig, EncoderConfig, VideoCodecConfig};
pub use error::EncoderError;
pub use ffmpeg::FfmpegTool;
pub use stage::run_stage;
pub use traits::{Encoder, Prober};
pub use types::{Invocation, ToolExit};
