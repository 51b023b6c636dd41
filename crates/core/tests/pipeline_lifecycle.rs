//! Pipeline lifecycle integration tests.
//!
//! These tests drive the pass pipeline with the mock tool over real
//! temporary files:
//! - Stage ordering and state transitions
//! - Bitrate allocation from the measured audio size
//! - Audio planning (no audio, alternate source, copy mode)
//! - Failure states and artifact retention
//! - Cleanup and idempotent reruns

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use sizecap_core::{
    audio::AudioQuality,
    encoder::EncoderError,
    probe::ProbeError,
    testing::{fixtures, MockTool, RecordedInvocation},
    BitrateError, EncodeRequest, EncoderConfig, PassPipeline, PipelineConfig, PipelineError,
    PipelineEvent, PipelineState, Stage,
};

const TARGET_KIB: u64 = 6144;

/// Test helper owning the mock tool and a scratch directory with an input file.
struct TestHarness {
    tool: Arc<MockTool>,
    dir: TempDir,
    input: PathBuf,
}

impl TestHarness {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"source").expect("Failed to write input");

        Self {
            tool: Arc::new(MockTool::new()),
            dir,
            input,
        }
    }

    fn request(&self) -> sizecap_core::request::EncodeRequestBuilder {
        EncodeRequest::builder(&self.input).target_kib(TARGET_KIB)
    }

    fn pipeline(
        &self,
        request: EncodeRequest,
        config: PipelineConfig,
    ) -> PassPipeline<MockTool, MockTool> {
        PassPipeline::new(
            EncoderConfig::default(),
            config,
            Arc::clone(&self.tool),
            Arc::clone(&self.tool),
            request,
        )
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

async fn recorded(harness: &TestHarness, stage: Stage) -> RecordedInvocation {
    harness
        .tool
        .recorded_invocations()
        .await
        .into_iter()
        .find(|r| r.invocation.stage == stage)
        .expect("stage was not run")
}

const FULL_HISTORY: [PipelineState; 8] = [
    PipelineState::Init,
    PipelineState::Probed,
    PipelineState::AudioAllocated,
    PipelineState::StatsPassDone,
    PipelineState::BitrateComputed,
    PipelineState::EncodePassDone,
    PipelineState::Muxed,
    PipelineState::Cleaned,
];

#[tokio::test]
async fn test_successful_run_with_audio() {
    let harness = TestHarness::new();
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    let report = pipeline.run().await.unwrap();

    assert_eq!(pipeline.state(), PipelineState::Cleaned);
    assert_eq!(pipeline.history(), &FULL_HISTORY);
    assert_eq!(
        harness.tool.stage_order().await,
        vec![Stage::Audio, Stage::StatsPass, Stage::EncodePass, Stage::Mux]
    );

    // (6144 - 100) * 8 / 120 = 402.93
    assert_eq!(report.plan.audio_kib, 100);
    assert_eq!(report.plan.video_bitrate_kbps, 402);
    let encode = &harness.tool.invocations_for(Stage::EncodePass).await[0];
    assert_eq!(arg(&encode.args, "-b:v"), Some("402k"));
    assert_eq!(arg(&encode.args, "-pass"), Some("2"));

    let stats = &harness.tool.invocations_for(Stage::StatsPass).await[0];
    assert_eq!(arg(&stats.args, "-pass"), Some("1"));
    assert_eq!(arg(&stats.args, "-b:v"), None);
    assert_eq!(
        arg(&stats.args, "-passlogfile"),
        arg(&encode.args, "-passlogfile")
    );

    let mux = &harness.tool.invocations_for(Stage::Mux).await[0];
    let cap = (TARGET_KIB * 1024).to_string();
    assert_eq!(arg(&mux.args, "-fs"), Some(cap.as_str()));

    let output = harness.path("clip_converted.webm");
    assert_eq!(report.output, output);
    assert_eq!(report.output_size_bytes, 600 * 1024);
    assert_eq!(std::fs::metadata(&output).unwrap().len(), 600 * 1024);
    assert!(report.within_target());

    // Audio, stats output, video and the stats log were removed.
    assert!(pipeline.paths().existing_intermediates().is_empty());
    assert_eq!(report.cleanup.removed.len(), 4);
    assert!(report.cleanup.is_clean());
    assert!(harness.input.exists());
}

#[tokio::test]
async fn test_no_audio_flag_skips_audio_stage() {
    let harness = TestHarness::new();
    let request = harness.request().no_audio(true).build().unwrap();
    let mut pipeline = harness.pipeline(request, PipelineConfig::default());

    let report = pipeline.run().await.unwrap();

    assert_eq!(
        harness.tool.stage_order().await,
        vec![Stage::StatsPass, Stage::EncodePass]
    );
    assert_eq!(pipeline.history(), &FULL_HISTORY);
    assert!(report.audio.is_none());
    assert_eq!(report.plan.audio_kib, 0);
    // 6144 * 8 / 120 = 409.6
    assert_eq!(report.plan.video_bitrate_kbps, 409);

    // The video-only artifact becomes the output.
    assert_eq!(report.output, harness.path("clip_converted.webm"));
    assert_eq!(report.output_size_bytes, 500 * 1024);
    assert!(report.output.exists());
    assert!(!pipeline.paths().video.exists());
}

#[tokio::test]
async fn test_silent_source_has_no_audio() {
    let harness = TestHarness::new();
    harness
        .tool
        .set_default_report(fixtures::probe_report(120.0, 0))
        .await;
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    let report = pipeline.run().await.unwrap();

    assert!(harness.tool.invocations_for(Stage::Audio).await.is_empty());
    assert!(report.audio.is_none());
}

#[tokio::test]
async fn test_multiple_audio_streams_fail_at_probe() {
    let harness = TestHarness::new();
    harness
        .tool
        .set_default_report(fixtures::probe_report(120.0, 2))
        .await;
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Probe(ProbeError::MultipleAudioStreams { count: 2, .. })
    ));
    assert_eq!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Stage::Probe
        }
    );
    assert!(harness.tool.recorded_invocations().await.is_empty());
}

#[tokio::test]
async fn test_probe_error_fails_at_probe() {
    let harness = TestHarness::new();
    harness
        .tool
        .set_next_probe_error(ProbeError::failed("unreadable container"))
        .await;
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.failed_stage(), Some(Stage::Probe));
    assert_eq!(pipeline.history().len(), 2);
}

#[tokio::test]
async fn test_missing_duration_fails_at_probe() {
    let harness = TestHarness::new();
    harness
        .tool
        .set_default_report(fixtures::probe_report_without_duration())
        .await;
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Probe(ProbeError::ParseError { .. })));
}

#[tokio::test]
async fn test_empty_trim_window_fails_before_encoding() {
    let harness = TestHarness::new();
    let request = harness
        .request()
        .trim_str(Some("00:03:00"), None)
        .unwrap()
        .build()
        .unwrap();
    let mut pipeline = harness.pipeline(request, PipelineConfig::default());

    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Trim(_)));
    assert_eq!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Stage::Probe
        }
    );
    assert!(harness.tool.recorded_invocations().await.is_empty());
}

#[tokio::test]
async fn test_audio_failure_stops_run() {
    let harness = TestHarness::new();
    harness.tool.fail_stage(Stage::Audio, 1).await;
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    let err = pipeline.run().await.unwrap_err();

    match err {
        PipelineError::Stage { stage, ref source } => {
            assert_eq!(stage, Stage::Audio);
            assert_eq!(source.exit_code(), Some(1));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        pipeline.history(),
        &[
            PipelineState::Init,
            PipelineState::Probed,
            PipelineState::Failed {
                stage: Stage::Audio
            },
        ]
    );
    assert_eq!(harness.tool.stage_order().await, vec![Stage::Audio]);
}

#[tokio::test]
async fn test_encode_failure_leaves_artifacts() {
    let harness = TestHarness::new();
    harness.tool.fail_stage(Stage::EncodePass, 1).await;
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.failed_stage(), Some(Stage::EncodePass));
    assert_eq!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Stage::EncodePass
        }
    );

    let paths = pipeline.paths();
    assert!(paths.audio.exists());
    assert!(paths.stats_output.exists());
    assert!(paths.passlog_files()[0].exists());
    assert!(!paths.output.exists());
}

#[tokio::test]
async fn test_missing_artifact_is_a_stage_failure() {
    let harness = TestHarness::new();
    harness.tool.skip_output(Stage::EncodePass).await;
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Stage {
            stage: Stage::EncodePass,
            source: EncoderError::MissingArtifact { .. },
        }
    ));
}

#[tokio::test]
async fn test_audio_over_budget_fails_at_bitrate() {
    let harness = TestHarness::new();
    harness
        .tool
        .set_artifact_size(Stage::Audio, 150 * 1024)
        .await;
    let request = harness.request().target_kib(100).build().unwrap();
    let mut pipeline = harness.pipeline(request, PipelineConfig::default());

    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Bitrate(BitrateError::AudioExceedsTarget {
            target_kib: 100,
            audio_kib: 150,
        })
    ));
    assert!(err.to_string().contains("audio"));
    assert_eq!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Stage::Bitrate
        }
    );
    assert!(harness.tool.invocations_for(Stage::EncodePass).await.is_empty());
    assert!(pipeline.paths().audio.exists());
}

#[tokio::test]
async fn test_trim_window_applies_to_video_and_audio() {
    let harness = TestHarness::new();
    let request = harness
        .request()
        .trim_str(Some("00:00:10"), Some("00:01:00"))
        .unwrap()
        .build()
        .unwrap();
    let mut pipeline = harness.pipeline(request, PipelineConfig::default());

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.window.length_secs, 50.0);
    // (6144 - 100) * 8 / 50 = 967.04
    assert_eq!(report.plan.video_bitrate_kbps, 967);

    for stage in [Stage::Audio, Stage::StatsPass, Stage::EncodePass] {
        let invocation = &harness.tool.invocations_for(stage).await[0];
        assert_eq!(arg(&invocation.args, "-ss"), Some("00:00:10.000"), "{stage}");
        assert_eq!(arg(&invocation.args, "-to"), Some("00:01:00.000"), "{stage}");
    }
}

#[tokio::test]
async fn test_alternate_audio_source_uses_duration_trim() {
    let harness = TestHarness::new();
    let track = harness.path("track.flac");
    let request = harness
        .request()
        .trim_str(Some("00:00:10"), Some("00:01:00"))
        .unwrap()
        .audio_source(&track)
        .audio_quality(AudioQuality::Copy)
        .build()
        .unwrap();
    let mut pipeline = harness.pipeline(request, PipelineConfig::default());

    let report = pipeline.run().await.unwrap();

    let audio = &harness.tool.invocations_for(Stage::Audio).await[0];
    assert_eq!(arg(&audio.args, "-i"), Some(path_str(&track).as_str()));
    assert_eq!(arg(&audio.args, "-ss"), None);
    assert_eq!(arg(&audio.args, "-to"), Some("00:00:50.000"));
    assert_eq!(arg(&audio.args, "-c:a"), Some("copy"));
    assert_eq!(
        report
            .audio
            .as_ref()
            .and_then(|a| a.path.extension())
            .and_then(|e| e.to_str()),
        Some("mka")
    );

    // The alternate source is never probed.
    assert_eq!(harness.tool.probed_paths().await, vec![harness.input.clone()]);
}

#[tokio::test]
async fn test_no_audio_overrides_alternate_source() {
    let harness = TestHarness::new();
    let request = harness
        .request()
        .audio_source(harness.path("track.flac"))
        .no_audio(true)
        .build()
        .unwrap();
    let mut pipeline = harness.pipeline(request, PipelineConfig::default());

    let report = pipeline.run().await.unwrap();

    assert!(report.audio.is_none());
    assert!(harness.tool.invocations_for(Stage::Audio).await.is_empty());
}

#[tokio::test]
async fn test_video_filter_reaches_both_passes() {
    let harness = TestHarness::new();
    let request = harness.request().video_filter("scale=640:-1").build().unwrap();
    let mut pipeline = harness.pipeline(request, PipelineConfig::default());

    pipeline.run().await.unwrap();

    for stage in [Stage::StatsPass, Stage::EncodePass] {
        let invocation = &harness.tool.invocations_for(stage).await[0];
        assert_eq!(arg(&invocation.args, "-vf"), Some("scale=640:-1"));
    }
    let audio = &harness.tool.invocations_for(Stage::Audio).await[0];
    assert_eq!(arg(&audio.args, "-vf"), None);
}

#[tokio::test]
async fn test_concurrent_audio_and_stats_pass() {
    let harness = TestHarness::new();
    harness
        .tool
        .set_run_duration(Duration::from_millis(20))
        .await;
    let config = PipelineConfig::default().with_concurrent_audio(true);
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), config);

    let report = pipeline.run().await.unwrap();

    assert_eq!(pipeline.history(), &FULL_HISTORY);
    assert_eq!(report.plan.video_bitrate_kbps, 402);

    let order = harness.tool.stage_order().await;
    assert_eq!(order.len(), 4);
    assert!(order[..2].contains(&Stage::Audio));
    assert!(order[..2].contains(&Stage::StatsPass));
    assert_eq!(&order[2..], &[Stage::EncodePass, Stage::Mux]);

    let audio = recorded(&harness, Stage::Audio).await;
    let stats = recorded(&harness, Stage::StatsPass).await;
    assert!(audio.overlaps(&stats));
}

#[tokio::test]
async fn test_sequential_audio_precedes_stats_pass() {
    let harness = TestHarness::new();
    harness
        .tool
        .set_run_duration(Duration::from_millis(20))
        .await;
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    pipeline.run().await.unwrap();

    let audio = recorded(&harness, Stage::Audio).await;
    let stats = recorded(&harness, Stage::StatsPass).await;
    assert!(!audio.overlaps(&stats));
    assert!(audio.finished_at <= stats.started_at);
}

#[tokio::test]
async fn test_dropped_run_keeps_finished_artifacts() {
    let harness = TestHarness::new();
    harness
        .tool
        .set_run_duration(Duration::from_millis(300))
        .await;
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    // The audio pass finishes at ~300ms, the stats pass would at ~600ms.
    let result = tokio::time::timeout(Duration::from_millis(450), pipeline.run()).await;
    assert!(result.is_err());

    assert_eq!(pipeline.state(), PipelineState::AudioAllocated);
    assert!(!pipeline.state().is_terminal());
    assert_eq!(harness.tool.stage_order().await, vec![Stage::Audio]);

    // Nothing was cleaned up and no output was produced.
    assert!(pipeline.paths().audio.exists());
    assert!(!pipeline.paths().stats_output.exists());
    assert!(!pipeline.paths().video.exists());
    assert!(!harness.path("clip_converted.webm").exists());
    assert_eq!(
        pipeline.paths().existing_intermediates(),
        vec![pipeline.paths().audio.clone()]
    );
}

#[tokio::test]
async fn test_largest_target_does_not_overflow() {
    let harness = TestHarness::new();
    let request = harness
        .request()
        .target_kib(sizecap_core::request::MAX_TARGET_KIB)
        .build()
        .unwrap();
    let mut pipeline = harness.pipeline(request, PipelineConfig::default());

    let report = pipeline.run().await.unwrap();

    let mux = &harness.tool.invocations_for(Stage::Mux).await[0];
    let cap = (sizecap_core::request::MAX_TARGET_KIB * 1024).to_string();
    assert_eq!(arg(&mux.args, "-fs"), Some(cap.as_str()));
    assert!(report.within_target());
}

#[tokio::test]
async fn test_concurrent_stats_failure_is_reported() {
    let harness = TestHarness::new();
    harness.tool.fail_stage(Stage::StatsPass, 2).await;
    let config = PipelineConfig::default().with_concurrent_audio(true);
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), config);

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.failed_stage(), Some(Stage::StatsPass));
    assert_eq!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Stage::StatsPass
        }
    );
    assert!(harness.tool.invocations_for(Stage::EncodePass).await.is_empty());
}

#[tokio::test]
async fn test_keep_intermediates() {
    let harness = TestHarness::new();
    let config = PipelineConfig::default().with_keep_intermediates(true);
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), config);

    let report = pipeline.run().await.unwrap();

    assert_eq!(pipeline.state(), PipelineState::Cleaned);
    assert!(report.cleanup.removed.is_empty());
    assert!(pipeline.paths().audio.exists());
    assert!(pipeline.paths().video.exists());
}

#[tokio::test]
async fn test_size_cap_can_be_disabled() {
    let harness = TestHarness::new();
    let config = PipelineConfig::default().with_size_cap(false);
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), config);

    pipeline.run().await.unwrap();

    let mux = &harness.tool.invocations_for(Stage::Mux).await[0];
    assert_eq!(arg(&mux.args, "-fs"), None);
}

#[tokio::test]
async fn test_work_dir_holds_intermediates() {
    let harness = TestHarness::new();
    let work_dir = harness.path("scratch/run");
    let config = PipelineConfig::default()
        .with_work_dir(work_dir.clone())
        .with_keep_intermediates(true);
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), config);

    let report = pipeline.run().await.unwrap();

    assert!(work_dir.is_dir());
    assert!(pipeline.paths().audio.starts_with(&work_dir));
    assert!(pipeline.paths().video.exists());
    assert_eq!(report.output, harness.path("clip_converted.webm"));
}

#[tokio::test]
async fn test_identical_requests_are_idempotent() {
    let harness = TestHarness::new();

    let mut first = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());
    let first_report = first.run().await.unwrap();
    let first_outputs: Vec<PathBuf> = harness
        .tool
        .recorded_invocations()
        .await
        .into_iter()
        .map(|r| r.invocation.output)
        .collect();

    let mut second = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());
    let second_report = second.run().await.unwrap();
    let all_outputs: Vec<PathBuf> = harness
        .tool
        .recorded_invocations()
        .await
        .into_iter()
        .map(|r| r.invocation.output)
        .collect();

    assert_eq!(first.paths(), second.paths());
    assert_eq!(&all_outputs[..4], &first_outputs[..]);
    assert_eq!(&all_outputs[4..], &first_outputs[..]);
    assert_eq!(first_report.output, second_report.output);
    assert_eq!(first_report.output_size_bytes, second_report.output_size_bytes);
    assert!(second.paths().existing_intermediates().is_empty());
}

#[tokio::test]
async fn test_different_requests_use_separate_stats_logs() {
    let harness = TestHarness::new();
    let a = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());
    let b = harness.pipeline(
        harness.request().target_kib(2048).build().unwrap(),
        PipelineConfig::default(),
    );

    assert_ne!(a.paths().passlog_prefix, b.paths().passlog_prefix);
}

#[tokio::test]
async fn test_pipeline_runs_once() {
    let harness = TestHarness::new();
    let mut pipeline = harness.pipeline(harness.request().build().unwrap(), PipelineConfig::default());

    pipeline.run().await.unwrap();
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::InvalidState(PipelineState::Cleaned)
    ));
    assert_eq!(pipeline.state(), PipelineState::Cleaned);
}

#[tokio::test]
async fn test_events_describe_the_run() {
    let harness = TestHarness::new();
    let (tx, mut rx) = mpsc::channel(256);
    let mut pipeline = harness
        .pipeline(harness.request().build().unwrap(), PipelineConfig::default())
        .with_events(tx);

    pipeline.run().await.unwrap();
    drop(pipeline);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(
        events.first(),
        Some(&PipelineEvent::StageStarted {
            stage: Stage::Probe
        })
    );
    assert!(matches!(events.last(), Some(PipelineEvent::Completed { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::BitrateComputed { plan } if plan.video_bitrate_kbps == 402
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::StageProgress {
            stage: Stage::EncodePass,
            ..
        }
    )));

    let completed: Vec<Stage> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StageCompleted { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        completed,
        vec![
            Stage::Probe,
            Stage::Audio,
            Stage::StatsPass,
            Stage::Bitrate,
            Stage::EncodePass,
            Stage::Mux,
            Stage::Cleanup,
        ]
    );
}

#[tokio::test]
async fn test_failure_event_names_the_stage() {
    let harness = TestHarness::new();
    harness.tool.fail_stage(Stage::Mux, 1).await;
    let (tx, mut rx) = mpsc::channel(256);
    let mut pipeline = harness
        .pipeline(harness.request().build().unwrap(), PipelineConfig::default())
        .with_events(tx);

    pipeline.run().await.unwrap_err();
    drop(pipeline);

    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }
    match last {
        Some(PipelineEvent::Failed { stage, error }) => {
            assert_eq!(stage, Stage::Mux);
            assert!(error.contains("mux stage failed"));
        }
        other => panic!("unexpected last event: {other:?}"),
    }
}
