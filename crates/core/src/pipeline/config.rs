//! Configuration for the pipeline module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::request::DEFAULT_TARGET_KIB;

/// Configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Size budget used when the caller does not give one, in KiB.
    #[serde(default = "default_target_kib")]
    pub default_target_kib: u64,

    /// Run the audio pass and the stats pass at the same time.
    #[serde(default)]
    pub concurrent_audio: bool,

    /// Pass the size budget to the muxer as a hard cap.
    #[serde(default = "default_enforce_size_cap")]
    pub enforce_size_cap: bool,

    /// Leave intermediate files on disk after a successful run.
    #[serde(default)]
    pub keep_intermediates: bool,

    /// Appended to the input file stem to name the final output.
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    /// Directory for intermediate files. Defaults to the input's directory.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_target_kib() -> u64 {
    DEFAULT_TARGET_KIB
}

fn default_enforce_size_cap() -> bool {
    true
}

fn default_output_suffix() -> String {
    "_converted".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_target_kib: default_target_kib(),
            concurrent_audio: false,
            enforce_size_cap: default_enforce_size_cap(),
            keep_intermediates: false,
            output_suffix: default_output_suffix(),
            work_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Enables running audio alongside the stats pass.
    pub fn with_concurrent_audio(mut self, enabled: bool) -> Self {
        self.concurrent_audio = enabled;
        self
    }

    /// Keeps intermediates after success.
    pub fn with_keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    /// Sets the intermediate directory.
    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.work_dir = Some(dir);
        self
    }

    /// Toggles the muxer size cap.
    pub fn with_size_cap(mut self, enforce: bool) -> Self {
        self.enforce_size_cap = enforce;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.default_target_kib, 10_000);
        assert!(!config.concurrent_audio);
        assert!(config.enforce_size_cap);
        assert!(!config.keep_intermediates);
        assert_eq!(config.output_suffix, "_converted");
        assert!(config.work_dir.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PipelineConfig = toml::from_str("concurrent_audio = true").unwrap();
        assert!(config.concurrent_audio);
        assert!(config.enforce_size_cap);
        assert_eq!(config.output_suffix, "_converted");
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::default()
            .with_concurrent_audio(true)
            .with_keep_intermediates(true)
            .with_size_cap(false)
            .with_work_dir(PathBuf::from("/scratch"));

        assert!(config.concurrent_audio);
        assert!(config.keep_intermediates);
        assert!(!config.enforce_size_cap);
        assert_eq!(config.work_dir, Some(PathBuf::from("/scratch")));
    }
}
