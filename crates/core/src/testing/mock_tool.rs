//! Mock prober/encoder for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio::sync::{mpsc, RwLock};

use crate::encoder::{Encoder, EncoderError, Invocation, Prober, ToolExit};
use crate::pipeline::{PipelineEvent, Stage};
use crate::probe::{ProbeError, ProbeReport};

use super::fixtures;

/// A recorded encoder run for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    /// The invocation that was submitted.
    pub invocation: Invocation,
    /// How the run ended.
    pub exit: ToolExit,
    /// When the run was submitted.
    pub started_at: Instant,
    /// When the run returned.
    pub finished_at: Instant,
}

impl RecordedInvocation {
    /// Whether this run and `other` were in flight at the same time.
    pub fn overlaps(&self, other: &RecordedInvocation) -> bool {
        self.started_at < other.finished_at && other.started_at < self.finished_at
    }
}

/// Mock implementation of the [`Prober`] and [`Encoder`] traits.
///
/// Instead of running ffmpeg it writes a file of a configured size to the
/// invocation's output path, so size measurement and cleanup see real files.
/// The stats pass also writes the `-passlogfile` log. Mux output is the sum of
/// its inputs, truncated to `-fs` when present.
///
/// # Example
///
/// ```rust,ignore
/// use sizecap_core::testing::{fixtures, MockTool};
///
/// let tool = MockTool::new();
/// tool.set_default_report(fixtures::probe_report(120.0, 1)).await;
/// tool.set_artifact_size(Stage::Audio, 1200 * 1024).await;
/// tool.fail_stage(Stage::Mux, 1).await;
/// ```
#[derive(Debug, Clone)]
pub struct MockTool {
    /// Recorded encoder runs.
    invocations: Arc<RwLock<Vec<RecordedInvocation>>>,
    /// Recorded probe paths.
    probes: Arc<RwLock<Vec<PathBuf>>>,
    /// Pre-configured probe reports by path.
    probe_reports: Arc<RwLock<HashMap<PathBuf, ProbeReport>>>,
    /// Report for paths without a configured one.
    default_report: Arc<RwLock<ProbeReport>>,
    /// If set, the next probe fails with this error.
    next_probe_error: Arc<RwLock<Option<ProbeError>>>,
    /// Exit codes for stages that should fail.
    stage_failures: Arc<RwLock<HashMap<Stage, i32>>>,
    /// Stages that exit successfully without writing their output.
    silent_stages: Arc<RwLock<HashSet<Stage>>>,
    /// Output sizes in bytes per stage.
    artifact_sizes: Arc<RwLock<HashMap<Stage, u64>>>,
    /// Simulated run duration in milliseconds.
    run_duration_ms: Arc<RwLock<u64>>,
}

impl Default for MockTool {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTool {
    /// Create a new mock tool.
    ///
    /// Probes report a 120 second source with one video and one audio stream.
    pub fn new() -> Self {
        let sizes = HashMap::from([
            (Stage::Audio, 100 * 1024),
            (Stage::StatsPass, 4 * 1024),
            (Stage::EncodePass, 500 * 1024),
        ]);

        Self {
            invocations: Arc::new(RwLock::new(Vec::new())),
            probes: Arc::new(RwLock::new(Vec::new())),
            probe_reports: Arc::new(RwLock::new(HashMap::new())),
            default_report: Arc::new(RwLock::new(fixtures::probe_report(120.0, 1))),
            next_probe_error: Arc::new(RwLock::new(None)),
            stage_failures: Arc::new(RwLock::new(HashMap::new())),
            silent_stages: Arc::new(RwLock::new(HashSet::new())),
            artifact_sizes: Arc::new(RwLock::new(sizes)),
            run_duration_ms: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded encoder runs.
    pub async fn recorded_invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.read().await.clone()
    }

    /// Recorded runs of one stage.
    pub async fn invocations_for(&self, stage: Stage) -> Vec<Invocation> {
        self.invocations
            .read()
            .await
            .iter()
            .filter(|r| r.invocation.stage == stage)
            .map(|r| r.invocation.clone())
            .collect()
    }

    /// Stages in the order they were run.
    pub async fn stage_order(&self) -> Vec<Stage> {
        self.invocations
            .read()
            .await
            .iter()
            .map(|r| r.invocation.stage)
            .collect()
    }

    /// Paths that were probed.
    pub async fn probed_paths(&self) -> Vec<PathBuf> {
        self.probes.read().await.clone()
    }

    /// Set a probe report for a specific path.
    pub async fn set_probe_report(&self, path: impl AsRef<Path>, report: ProbeReport) {
        self.probe_reports
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), report);
    }

    /// Set the report for paths without a specific one.
    pub async fn set_default_report(&self, report: ProbeReport) {
        *self.default_report.write().await = report;
    }

    /// Configure the next probe to fail with the given error.
    pub async fn set_next_probe_error(&self, error: ProbeError) {
        *self.next_probe_error.write().await = Some(error);
    }

    /// Make every run of `stage` exit with `code`.
    pub async fn fail_stage(&self, stage: Stage, code: i32) {
        self.stage_failures.write().await.insert(stage, code);
    }

    /// Make `stage` exit successfully without producing its output.
    pub async fn skip_output(&self, stage: Stage) {
        self.silent_stages.write().await.insert(stage);
    }

    /// Set the size of the file `stage` writes.
    pub async fn set_artifact_size(&self, stage: Stage, size_bytes: u64) {
        self.artifact_sizes.write().await.insert(stage, size_bytes);
    }

    /// Set the simulated duration of every run.
    pub async fn set_run_duration(&self, duration: Duration) {
        *self.run_duration_ms.write().await = duration.as_millis() as u64;
    }

    async fn take_probe_error(&self) -> Option<ProbeError> {
        self.next_probe_error.write().await.take()
    }

    async fn output_size(&self, invocation: &Invocation) -> u64 {
        if invocation.stage != Stage::Mux {
            return self
                .artifact_sizes
                .read()
                .await
                .get(&invocation.stage)
                .copied()
                .unwrap_or(1024);
        }

        let mut total = 0;
        for (i, arg) in invocation.args.iter().enumerate() {
            if arg == "-i" {
                if let Some(input) = invocation.args.get(i + 1) {
                    if let Ok(meta) = tokio::fs::metadata(input).await {
                        total += meta.len();
                    }
                }
            }
        }
        match invocation.arg_value("-fs").and_then(|v| v.parse::<u64>().ok()) {
            Some(cap) => total.min(cap),
            None => total,
        }
    }

    async fn write_outputs(&self, invocation: &Invocation) -> Result<(), EncoderError> {
        let size = self.output_size(invocation).await as usize;
        tokio::fs::write(&invocation.output, vec![0u8; size]).await?;

        if invocation.stage == Stage::StatsPass {
            if let Some(prefix) = invocation.arg_value("-passlogfile") {
                tokio::fs::write(format!("{}-0.log", prefix), b"stats").await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Prober for MockTool {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeReport, ProbeError> {
        self.probes.write().await.push(path.to_path_buf());

        if let Some(err) = self.take_probe_error().await {
            return Err(err);
        }

        if let Some(report) = self.probe_reports.read().await.get(path) {
            return Ok(report.clone());
        }

        Ok(self.default_report.read().await.clone())
    }
}

#[async_trait]
impl Encoder for MockTool {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(
        &self,
        invocation: &Invocation,
        progress_tx: Option<&mpsc::Sender<PipelineEvent>>,
    ) -> Result<ToolExit, EncoderError> {
        let started_at = Instant::now();
        let duration_ms = *self.run_duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        let failure = self
            .stage_failures
            .read()
            .await
            .get(&invocation.stage)
            .copied();

        let exit = match failure {
            Some(code) => ToolExit::failure(code, format!("mock {} failure", invocation.stage)),
            None => {
                if !self.silent_stages.read().await.contains(&invocation.stage) {
                    self.write_outputs(invocation).await?;
                }
                if let Some(tx) = progress_tx {
                    let _ = tx.try_send(PipelineEvent::StageProgress {
                        stage: invocation.stage,
                        percent: 100.0,
                        time_secs: invocation.expected_duration_secs.unwrap_or(0.0),
                        speed: Some("10x".to_string()),
                    });
                }
                ToolExit::success()
            }
        };

        self.invocations.write().await.push(RecordedInvocation {
            invocation: invocation.clone(),
            exit: exit.clone(),
            started_at,
            finished_at: Instant::now(),
        });

        Ok(exit)
    }
}
