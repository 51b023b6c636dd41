//! The pass pipeline: probe, audio, stats pass, bitrate, encode pass, mux, cleanup.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::state::{PipelineState, Stage};
use super::types::{PipelineEvent, PipelineReport};
use crate::artifacts::{ArtifactPaths, PassArtifact};
use crate::audio::{plan_audio, AudioAllocator, AudioPlan};
use crate::bitrate::BitratePlan;
use crate::cleanup::{ArtifactCleaner, CleanupReport};
use crate::config::Config;
use crate::encoder::{
    run_stage, CommandBuilder, Encoder, EncoderConfig, Invocation, MuxOptions, Prober, VideoPass,
    VideoPassOptions,
};
use crate::probe::probe_media;
use crate::request::EncodeRequest;
use crate::trim::TrimWindow;

/// Drives one [`EncodeRequest`] through every stage.
///
/// A pipeline runs once. Failure leaves every intermediate on disk; only a
/// fully successful run removes them.
pub struct PassPipeline<P: Prober + ?Sized, E: Encoder + ?Sized> {
    prober: Arc<P>,
    encoder: Arc<E>,
    encoder_config: EncoderConfig,
    config: PipelineConfig,
    request: EncodeRequest,
    paths: ArtifactPaths,
    state: PipelineState,
    history: Vec<PipelineState>,
    events: Option<mpsc::Sender<PipelineEvent>>,
}

impl<P: Prober + ?Sized, E: Encoder + ?Sized> PassPipeline<P, E> {
    /// Creates a pipeline for `request`.
    pub fn new(
        encoder_config: EncoderConfig,
        config: PipelineConfig,
        prober: Arc<P>,
        encoder: Arc<E>,
        request: EncodeRequest,
    ) -> Self {
        let paths = ArtifactPaths::derive(&request, &encoder_config, &config);
        Self {
            prober,
            encoder,
            encoder_config,
            config,
            request,
            paths,
            state: PipelineState::Init,
            history: vec![PipelineState::Init],
            events: None,
        }
    }

    /// Creates a pipeline from a loaded configuration.
    pub fn from_config(
        config: &Config,
        prober: Arc<P>,
        encoder: Arc<E>,
        request: EncodeRequest,
    ) -> Self {
        Self::new(
            config.encoder.clone(),
            config.pipeline.clone(),
            prober,
            encoder,
            request,
        )
    }

    /// Sends progress events on `tx` while running.
    pub fn with_events(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every state the run has been in, oldest first.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub fn request(&self) -> &EncodeRequest {
        &self.request
    }

    /// Runs every stage to completion.
    pub async fn run(&mut self) -> Result<PipelineReport, PipelineError> {
        if self.state != PipelineState::Init {
            return Err(PipelineError::InvalidState(self.state));
        }

        let started = Instant::now();
        info!(
            "Starting run {} for {:?} (target {} KiB)",
            self.paths.run_id,
            self.request.input(),
            self.request.target_kib()
        );

        match self.execute(started).await {
            Ok(report) => {
                info!(
                    "Finished {:?}: {} bytes in {}ms",
                    report.output, report.output_size_bytes, report.elapsed_ms
                );
                self.emit(PipelineEvent::Completed {
                    output: report.output.clone(),
                    size_bytes: report.output_size_bytes,
                })
                .await;
                Ok(report)
            }
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    async fn execute(&mut self, started: Instant) -> Result<PipelineReport, PipelineError> {
        // Probe
        let stage_started = self.begin(Stage::Probe).await;
        let source = probe_media(self.prober.as_ref(), self.request.input()).await?;
        let window = TrimWindow::resolve(
            source.duration_secs(),
            self.request.start(),
            self.request.end(),
        )?;
        info!(
            "Encoding {:.3}s of {:.3}s",
            window.length_secs,
            source.duration_secs()
        );
        self.prepare_work_dir().await?;
        self.complete(Stage::Probe, PipelineState::Probed, stage_started)
            .await?;

        // Audio and stats pass
        let audio_plan = plan_audio(&self.request, &source, &window);
        if audio_plan.is_none() {
            info!("Output will have no audio track");
            self.emit(PipelineEvent::AudioSkipped).await;
        }

        let audio = match audio_plan {
            Some(ref plan) if self.config.concurrent_audio => {
                let audio_started = self.begin(Stage::Audio).await;
                let stats_started = self.begin(Stage::StatsPass).await;
                let (audio, ()) =
                    tokio::try_join!(self.audio_pass(plan, &window), self.stats_pass(&window))?;
                self.complete(Stage::Audio, PipelineState::AudioAllocated, audio_started)
                    .await?;
                self.complete(Stage::StatsPass, PipelineState::StatsPassDone, stats_started)
                    .await?;
                Some(audio)
            }
            Some(ref plan) => {
                let audio_started = self.begin(Stage::Audio).await;
                let audio = self.audio_pass(plan, &window).await?;
                self.complete(Stage::Audio, PipelineState::AudioAllocated, audio_started)
                    .await?;

                let stats_started = self.begin(Stage::StatsPass).await;
                self.stats_pass(&window).await?;
                self.complete(Stage::StatsPass, PipelineState::StatsPassDone, stats_started)
                    .await?;
                Some(audio)
            }
            None => {
                self.transition(PipelineState::AudioAllocated)?;

                let stats_started = self.begin(Stage::StatsPass).await;
                self.stats_pass(&window).await?;
                self.complete(Stage::StatsPass, PipelineState::StatsPassDone, stats_started)
                    .await?;
                None
            }
        };

        // Bitrate
        let stage_started = self.begin(Stage::Bitrate).await;
        let audio_kib = audio.as_ref().map(PassArtifact::size_kib).unwrap_or(0);
        let plan = BitratePlan::compute(self.request.target_kib(), audio_kib, window.length_secs)?;
        self.emit(PipelineEvent::BitrateComputed { plan }).await;
        self.complete(Stage::Bitrate, PipelineState::BitrateComputed, stage_started)
            .await?;

        // Encode pass
        let stage_started = self.begin(Stage::EncodePass).await;
        let video = self.encode_pass(&window, &plan).await?;
        info!("Video artifact {:?}: {} KiB", video.path, video.size_kib());
        self.complete(Stage::EncodePass, PipelineState::EncodePassDone, stage_started)
            .await?;

        // Mux
        let stage_started = self.begin(Stage::Mux).await;
        let output = match audio {
            Some(ref audio) => self.mux(&video, audio, window.length_secs).await?,
            None => self.promote(&video).await?,
        };
        self.complete(Stage::Mux, PipelineState::Muxed, stage_started)
            .await?;

        if output.size_bytes > self.request.target_bytes() {
            warn!(
                "Output {:?} is {} bytes, over the {} byte target",
                output.path,
                output.size_bytes,
                self.request.target_bytes()
            );
        }

        // Cleanup
        let stage_started = self.begin(Stage::Cleanup).await;
        let cleanup = if self.config.keep_intermediates {
            info!("Keeping intermediate files");
            CleanupReport::default()
        } else {
            ArtifactCleaner.cleanup(&self.paths.intermediates()).await
        };
        self.complete(Stage::Cleanup, PipelineState::Cleaned, stage_started)
            .await?;

        Ok(PipelineReport {
            output: output.path,
            output_size_bytes: output.size_bytes,
            plan,
            source,
            window,
            audio,
            cleanup,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn audio_pass(
        &self,
        plan: &AudioPlan,
        window: &TrimWindow,
    ) -> Result<PassArtifact, PipelineError> {
        if plan.uses_alternate_source {
            info!("Taking audio from {:?}", plan.source);
        }
        AudioAllocator::new(self.encoder.as_ref(), &self.encoder_config)
            .allocate(
                plan,
                &self.paths.audio,
                window.length_secs,
                self.events.as_ref(),
            )
            .await
            .map_err(|e| PipelineError::stage(Stage::Audio, e))
    }

    async fn stats_pass(&self, window: &TrimWindow) -> Result<(), PipelineError> {
        let args = CommandBuilder::new(&self.encoder_config).video_pass_args(&VideoPassOptions {
            input: self.request.input(),
            window,
            filter: self.request.video_filter(),
            pass: VideoPass::Stats,
            passlog_prefix: &self.paths.passlog_prefix,
            output: &self.paths.stats_output,
        });
        let invocation = Invocation::new(Stage::StatsPass, args, self.paths.stats_output.clone())
            .with_duration(window.length_secs);

        run_stage(self.encoder.as_ref(), &invocation, self.events.as_ref())
            .await
            .map_err(|e| PipelineError::stage(Stage::StatsPass, e))?;
        Ok(())
    }

    async fn encode_pass(
        &self,
        window: &TrimWindow,
        plan: &BitratePlan,
    ) -> Result<PassArtifact, PipelineError> {
        let args = CommandBuilder::new(&self.encoder_config).video_pass_args(&VideoPassOptions {
            input: self.request.input(),
            window,
            filter: self.request.video_filter(),
            pass: VideoPass::Encode {
                bitrate_kbps: plan.video_bitrate_kbps,
            },
            passlog_prefix: &self.paths.passlog_prefix,
            output: &self.paths.video,
        });
        let invocation = Invocation::new(Stage::EncodePass, args, self.paths.video.clone())
            .with_duration(window.length_secs);

        run_stage(self.encoder.as_ref(), &invocation, self.events.as_ref())
            .await
            .map_err(|e| PipelineError::stage(Stage::EncodePass, e))
    }

    async fn mux(
        &self,
        video: &PassArtifact,
        audio: &PassArtifact,
        length_secs: f64,
    ) -> Result<PassArtifact, PipelineError> {
        let size_cap_bytes = self
            .config
            .enforce_size_cap
            .then(|| self.request.target_bytes());
        let args = CommandBuilder::new(&self.encoder_config).mux_args(&MuxOptions {
            video: &video.path,
            audio: &audio.path,
            size_cap_bytes,
            output: &self.paths.output,
        });
        let invocation = Invocation::new(Stage::Mux, args, self.paths.output.clone())
            .with_duration(length_secs);

        run_stage(self.encoder.as_ref(), &invocation, self.events.as_ref())
            .await
            .map_err(|e| PipelineError::stage(Stage::Mux, e))
    }

    /// Makes the video-only artifact the final output.
    async fn promote(&self, video: &PassArtifact) -> Result<PassArtifact, PipelineError> {
        let output = &self.paths.output;
        debug!("No audio to mux, moving {:?} to {:?}", video.path, output);

        if let Err(e) = tokio::fs::rename(&video.path, output).await {
            if e.kind() == ErrorKind::NotFound {
                return Err(workspace_error(Stage::Mux, &video.path, e));
            }
            // Work dir may be on another filesystem.
            debug!("Rename failed ({}), copying instead", e);
            tokio::fs::copy(&video.path, output)
                .await
                .map_err(|e| workspace_error(Stage::Mux, output, e))?;
            if let Err(e) = tokio::fs::remove_file(&video.path).await {
                warn!("Failed to remove {:?} after copy: {}", video.path, e);
            }
        }

        Ok(PassArtifact {
            path: output.clone(),
            size_bytes: video.size_bytes,
            stage: Stage::Mux,
        })
    }

    async fn prepare_work_dir(&self) -> Result<(), PipelineError> {
        if let Some(ref dir) = self.config.work_dir {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| workspace_error(Stage::Probe, dir, e))?;
        }
        Ok(())
    }

    async fn begin(&self, stage: Stage) -> Instant {
        debug!("Stage {} started", stage);
        self.emit(PipelineEvent::StageStarted { stage }).await;
        Instant::now()
    }

    async fn complete(
        &mut self,
        stage: Stage,
        next: PipelineState,
        started: Instant,
    ) -> Result<(), PipelineError> {
        self.transition(next)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!("Stage {} completed in {}ms", stage, elapsed_ms);
        self.emit(PipelineEvent::StageCompleted { stage, elapsed_ms })
            .await;
        Ok(())
    }

    fn transition(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidState(self.state));
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    async fn fail(&mut self, err: &PipelineError) {
        let stage = err
            .failed_stage()
            .or_else(|| self.state.next_stage())
            .unwrap_or(Stage::Probe);

        let failed = PipelineState::Failed { stage };
        if self.state.can_transition_to(failed) {
            self.state = failed;
            self.history.push(failed);
        }

        error!("Run {} failed at stage {}: {}", self.paths.run_id, stage, err);
        let leftovers = self.paths.existing_intermediates();
        if !leftovers.is_empty() {
            warn!(
                "Leaving {} intermediate files for inspection: {:?}",
                leftovers.len(),
                leftovers
            );
        }

        self.emit(PipelineEvent::Failed {
            stage,
            error: err.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event).await;
        }
    }
}

fn workspace_error(stage: Stage, path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Workspace {
        stage,
        path: path.to_path_buf(),
        source,
    }
}
