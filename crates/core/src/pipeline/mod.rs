//! Stage sequencing for a size-constrained two-pass encode.
//!
//! [`PassPipeline`] walks a run through the states
//!
//! ```text
//! Init -> Probed -> AudioAllocated -> StatsPassDone -> BitrateComputed
//!      -> EncodePassDone -> Muxed -> Cleaned
//! ```
//!
//! and into `Failed { stage }` from any of them. Audio allocation is a no-op
//! for silent outputs. The audio pass and the stats pass may run together
//! (see [`PipelineConfig::concurrent_audio`]); both are joined before the
//! bitrate is computed, so the audio size it reads is final.

mod config;
mod error;
mod runner;
mod state;
mod types;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use runner::PassPipeline;
pub use state::{PipelineState, Stage};
pub use types::{PipelineEvent, PipelineReport};
