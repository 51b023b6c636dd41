//! Intermediate and final file naming.
//!
//! All paths of a run are derived from the input path and a run id. The run
//! id is a short digest of the whole [`EncodeRequest`], so repeating an
//! identical request reuses (and overwrites) the same files, while runs with
//! different inputs or settings never share intermediates or a stats log.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::audio::AudioMode;
use crate::encoder::EncoderConfig;
use crate::pipeline::{PipelineConfig, Stage};
use crate::request::EncodeRequest;

/// Number of hex digits kept from the request digest.
const RUN_ID_LEN: usize = 12;

/// A file produced by one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub stage: Stage,
}

impl PassArtifact {
    /// Size in whole KiB, rounded down.
    pub fn size_kib(&self) -> u64 {
        self.size_bytes / 1024
    }
}

/// Every path a run reads from or writes to, besides its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub run_id: String,
    /// Audio artifact.
    pub audio: PathBuf,
    /// Throwaway output of the stats pass.
    pub stats_output: PathBuf,
    /// Prefix handed to the encoder for its stats log.
    pub passlog_prefix: PathBuf,
    /// Video-only output of the encode pass.
    pub video: PathBuf,
    /// Final muxed output.
    pub output: PathBuf,
}

impl ArtifactPaths {
    pub fn derive(
        request: &EncodeRequest,
        encoder: &EncoderConfig,
        pipeline: &PipelineConfig,
    ) -> Self {
        let run_id = run_id(request);
        let input = request.input();

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let input_dir = input.parent().unwrap_or_else(|| Path::new(""));
        let work_dir = pipeline.work_dir.as_deref().unwrap_or(input_dir);

        let video_ext = &encoder.video.extension;
        let audio_ext = AudioMode::from_quality(request.audio_quality()).extension(encoder);
        let intermediate = |suffix: &str, ext: Option<&str>| {
            let name = match ext {
                Some(ext) => format!("{}_{}_{}.{}", stem, run_id, suffix, ext),
                None => format!("{}_{}_{}", stem, run_id, suffix),
            };
            work_dir.join(name)
        };

        Self {
            audio: intermediate("a", Some(audio_ext)),
            stats_output: intermediate("dummy", Some(video_ext)),
            passlog_prefix: intermediate("2pass", None),
            video: intermediate("v", Some(video_ext)),
            output: input_dir.join(format!("{}{}.{}", stem, pipeline.output_suffix, video_ext)),
            run_id,
        }
    }

    /// Stats log files the encoder writes for `passlog_prefix`.
    pub fn passlog_files(&self) -> Vec<PathBuf> {
        let prefix = self.passlog_prefix.to_string_lossy();
        vec![
            PathBuf::from(format!("{}-0.log", prefix)),
            PathBuf::from(format!("{}-0.log.mbtree", prefix)),
        ]
    }

    /// Every intermediate file of the run, whether or not it exists yet.
    pub fn intermediates(&self) -> Vec<PathBuf> {
        let mut paths = vec![
            self.audio.clone(),
            self.stats_output.clone(),
            self.video.clone(),
        ];
        paths.extend(self.passlog_files());
        paths
    }

    /// Intermediates currently on disk.
    pub fn existing_intermediates(&self) -> Vec<PathBuf> {
        self.intermediates()
            .into_iter()
            .filter(|p| p.exists())
            .collect()
    }
}

/// Short, stable digest of the request.
pub fn run_id(request: &EncodeRequest) -> String {
    let mut hasher = Sha256::new();
    match serde_json::to_vec(request) {
        Ok(bytes) => hasher.update(&bytes),
        Err(_) => hasher.update(format!("{:?}", request).as_bytes()),
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..RUN_ID_LEN].to_string()
}
