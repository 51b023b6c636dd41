//! Running a single encoder stage and collecting its artifact.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::EncoderError;
use super::traits::Encoder;
use super::types::Invocation;
use crate::artifacts::PassArtifact;
use crate::pipeline::PipelineEvent;

/// Runs `invocation` and returns the artifact it produced.
///
/// The artifact size is read only after the encoder has exited, so it always
/// reflects a closed, fully written file.
pub async fn run_stage<E: Encoder + ?Sized>(
    encoder: &E,
    invocation: &Invocation,
    progress_tx: Option<&mpsc::Sender<PipelineEvent>>,
) -> Result<PassArtifact, EncoderError> {
    debug!(
        "Running {} stage with {}: {:?}",
        invocation.stage,
        encoder.name(),
        invocation.args
    );

    let exit = encoder.run(invocation, progress_tx).await?;
    if !exit.is_success() {
        warn!(
            "{} stage: {} exited with code {:?}",
            invocation.stage,
            encoder.name(),
            exit.code
        );
        return Err(EncoderError::ExitFailure {
            code: exit.code,
            stderr: exit.stderr,
        });
    }

    let metadata = tokio::fs::metadata(&invocation.output)
        .await
        .map_err(|_| EncoderError::MissingArtifact {
            path: invocation.output.clone(),
        })?;

    Ok(PassArtifact {
        path: invocation.output.clone(),
        size_bytes: metadata.len(),
        stage: invocation.stage,
    })
}
