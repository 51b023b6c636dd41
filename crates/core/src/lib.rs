pub mod artifacts;
pub mod audio;
pub mod bitrate;
pub mod cleanup;
pub mod config;
pub mod encoder;
pub mod pipeline;
pub mod probe;
pub mod request;
pub mod testing;
pub mod timecode;
pub mod trim;

pub use artifacts::{ArtifactPaths, PassArtifact};
pub use audio::{AudioMode, AudioPlan, AudioQuality, AudioTrim};
pub use bitrate::{compute_video_bitrate, BitrateError, BitratePlan};
pub use cleanup::{ArtifactCleaner, CleanupError, CleanupReport};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError,
};
pub use encoder::{Encoder, EncoderConfig, EncoderError, FfmpegTool, Prober};
pub use pipeline::{
    PassPipeline, PipelineConfig, PipelineError, PipelineEvent, PipelineReport, PipelineState,
    Stage,
};
pub use probe::{MediaSource, ProbeError};
pub use request::{EncodeRequest, RequestError};
pub use timecode::{format_timestamp, parse_timestamp, TimeFormatError, Timestamp};
pub use trim::{TrimError, TrimWindow};
