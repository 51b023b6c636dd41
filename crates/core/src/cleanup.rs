//! Best-effort removal of intermediate files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// An intermediate file could not be removed. Never fatal to a run.
#[derive(Debug, Error)]
#[error("failed to remove {path}: {source}")]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Removes intermediate artifacts after a successful run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactCleaner;

impl ArtifactCleaner {
    /// Attempts to remove every path. Missing files are skipped silently.
    pub async fn cleanup(&self, paths: &[PathBuf]) -> CleanupReport {
        let mut report = CleanupReport::default();

        for path in paths {
            match self.remove(path).await {
                Ok(true) => {
                    debug!("Removed {:?}", path);
                    report.removed.push(path.clone());
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("{}", e);
                    report.failed.push(path.clone());
                }
            }
        }

        report
    }

    async fn remove(&self, path: &Path) -> Result<bool, CleanupError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CleanupError {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
