//! Trait definitions for the external tools.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

use super::error::EncoderError;
use super::types::{Invocation, ToolExit};
use crate::pipeline::PipelineEvent;
use crate::probe::{ProbeError, ProbeReport};

/// Reads stream and container metadata from a media file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Returns the name of this prober implementation.
    fn name(&self) -> &str;

    /// Probes a media file.
    async fn probe(&self, path: &Path) -> Result<ProbeReport, ProbeError>;
}

/// Runs one encoder invocation to completion.
///
/// Implementations block (asynchronously) until the process has exited and
/// its output file is closed. A non-zero exit is reported through
/// [`ToolExit`], not as an error; errors are reserved for failing to run
/// the encoder at all.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Returns the name of this encoder implementation.
    fn name(&self) -> &str;

    /// Runs the invocation.
    ///
    /// If `progress_tx` is given, stage progress events are sent on it while
    /// the encoder runs. A full or closed channel never stalls the encoder.
    async fn run(
        &self,
        invocation: &Invocation,
        progress_tx: Option<&mpsc::Sender<PipelineEvent>>,
    ) -> Result<ToolExit, EncoderError>;
}
