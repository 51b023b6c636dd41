use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sizecap_core::{
    audio::AudioQuality, load_config_or_default, validate_config, EncodeRequest, FfmpegTool,
    PassPipeline, PipelineError, PipelineEvent, PipelineReport,
};

/// Buffer size for the pipeline event channel
const EVENT_BUFFER_SIZE: usize = 64;

/// Exit code after an interrupt (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

/// Encode a clip into a WebM file that fits a target size.
#[derive(Parser, Debug)]
#[command(name = "sizecap")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input media file.
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Start of the clip, in seconds or HH:MM:SS[.mmm].
    #[arg(long, value_name = "TIME")]
    start: Option<String>,

    /// End of the clip. Without --start this is the clip length.
    #[arg(long, value_name = "TIME")]
    end: Option<String>,

    /// Target size in KiB. Defaults to pipeline.default_target_kib.
    #[arg(long, value_name = "KIB")]
    size: Option<u64>,

    /// Video filter expression passed to both video passes.
    #[arg(long = "vf", value_name = "EXPR")]
    video_filter: Option<String>,

    /// Produce a video without audio.
    #[arg(long = "noaudio")]
    no_audio: bool,

    /// Take audio from this file instead of the input.
    #[arg(long = "audio", value_name = "PATH")]
    audio_source: Option<PathBuf>,

    /// Audio quality level, or "copy" to keep the source audio as is.
    #[arg(long = "aq", value_name = "Q|copy")]
    audio_quality: Option<AudioQuality>,

    /// Configuration file (TOML).
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Keep intermediate files after a successful run.
    #[arg(long)]
    keep_intermediates: bool,

    /// Run the audio pass alongside the first video pass.
    #[arg(long)]
    concurrent_audio: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Log as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

enum Outcome {
    Finished(Box<PipelineReport>),
    Failed(PipelineError),
    Interrupted,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.log_json);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    // Load configuration
    let mut config = load_config_or_default(args.config.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    if args.keep_intermediates {
        config.pipeline.keep_intermediates = true;
    }
    if args.concurrent_audio {
        config.pipeline.concurrent_audio = true;
    }
    debug!("Configuration: {:?}", config);

    // Build the request
    let mut builder = EncodeRequest::builder(&args.input)
        .target_kib(args.size.unwrap_or(config.pipeline.default_target_kib))
        .trim_str(args.start.as_deref(), args.end.as_deref())
        .context("Invalid trim boundaries")?
        .no_audio(args.no_audio);
    if let Some(filter) = args.video_filter {
        builder = builder.video_filter(filter);
    }
    if let Some(source) = args.audio_source {
        builder = builder.audio_source(source);
    }
    if let Some(quality) = args.audio_quality {
        builder = builder.audio_quality(quality);
    }
    let request = builder.build().context("Invalid request")?;

    // Check the tools before touching any file
    let tool = Arc::new(FfmpegTool::new(config.encoder.clone()));
    tool.validate().await.context("ffmpeg is not usable")?;
    info!(
        "Using {:?} and {:?}",
        config.encoder.ffmpeg_path, config.encoder.ffprobe_path
    );

    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
    let logger = tokio::spawn(log_events(event_rx));

    let mut pipeline = PassPipeline::from_config(&config, Arc::clone(&tool), tool, request)
        .with_events(event_tx);

    // Dropping the run future kills the running ffmpeg.
    let outcome = tokio::select! {
        result = pipeline.run() => match result {
            Ok(report) => Outcome::Finished(Box::new(report)),
            Err(e) => Outcome::Failed(e),
        },
        _ = shutdown_signal() => Outcome::Interrupted,
    };

    let leftovers = pipeline.paths().existing_intermediates();
    drop(pipeline);
    let _ = logger.await;

    match outcome {
        Outcome::Finished(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.output.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Failed(e) => {
            match e.failed_stage() {
                Some(stage) => eprintln!("failed at stage {}: {}", stage, e),
                None => eprintln!("failed: {}", e),
            }
            Ok(ExitCode::FAILURE)
        }
        Outcome::Interrupted => {
            warn!("Interrupted, leaving {} intermediate files", leftovers.len());
            for path in &leftovers {
                eprintln!("  {}", path.display());
            }
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

async fn log_events(mut rx: mpsc::Receiver<PipelineEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::StageStarted { stage } => info!("[{}] started", stage),
            PipelineEvent::StageProgress {
                stage,
                percent,
                speed,
                ..
            } => debug!(
                "[{}] {:.1}% ({})",
                stage,
                percent,
                speed.as_deref().unwrap_or("?")
            ),
            PipelineEvent::StageCompleted { stage, elapsed_ms } => {
                info!("[{}] done in {:.1}s", stage, elapsed_ms as f64 / 1000.0)
            }
            PipelineEvent::AudioSkipped => info!("No audio track"),
            PipelineEvent::BitrateComputed { plan } => {
                info!("Video bitrate: {}", plan.video_bitrate_arg())
            }
            PipelineEvent::Completed { output, size_bytes } => {
                info!("Wrote {:?} ({} KiB)", output, size_bytes / 1024)
            }
            PipelineEvent::Failed { stage, error } => error!("[{}] {}", stage, error),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
