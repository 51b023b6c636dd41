//! Source media probing.
//!
//! [`probe_media`] runs a [`Prober`](crate::encoder::Prober) and turns its
//! report into a validated [`MediaSource`]. Sources with more than one audio
//! stream are rejected outright.

mod error;
mod types;

pub use error::ProbeError;
pub use types::{CodecType, MediaSource, ProbeFormat, ProbeReport, ProbeStream, StreamInfo};

use std::path::Path;
use tracing::info;

use crate::encoder::Prober;

/// Probes `path` and validates the result.
pub async fn probe_media<P: Prober + ?Sized>(
    prober: &P,
    path: &Path,
) -> Result<MediaSource, ProbeError> {
    let report = prober.probe(path).await?;
    let source = MediaSource::from_report(report)?;
    info!(
        "Probed {:?}: {:.3}s, {} streams, audio: {}",
        path,
        source.duration_secs(),
        source.streams().len(),
        source
            .audio_stream()
            .and_then(|s| s.codec_name.as_deref())
            .unwrap_or("none")
    );
    Ok(source)
}
