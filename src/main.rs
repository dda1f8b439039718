use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use video_chat_server::analysis::{
    AnalysisManager, AnalysisPipeline, AttributeAnalyzer, CaptionChain, Captioner,
    FfmpegFrameSource, HttpAttributeAnalyzer, HttpObjectDetector, LlmCaptioner, NoopDetector,
    ObjectDetector, SamplingLimits,
};
use video_chat_server::background_jobs::jobs::{AnalysisStatusSyncJob, OrphanFrameCleanupJob};
use video_chat_server::background_jobs::{create_scheduler, JobContext};
use video_chat_server::chat::VideoChatHandler;
use video_chat_server::config;
use video_chat_server::llm::{build_provider, LlmProvider};
use video_chat_server::media::FileHandler;
use video_chat_server::server::{run_server, RequestsLoggingLevel, ServerConfig, ServerState};
use video_chat_server::video_store::{SqliteVideoStore, VideoStore};

/// Capacity of the hook channel between components and the job scheduler.
const HOOK_CHANNEL_CAPACITY: usize = 100;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the video database (videos.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// Directory for uploaded videos and extracted frames. Defaults to db_dir.
    #[clap(long, value_parser = parse_path)]
    pub media_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Maximum size of an uploaded video in megabytes.
    #[clap(long)]
    pub max_upload_mb: Option<u64>,

    /// URL of the object detection service.
    #[clap(long)]
    pub detector_url: Option<String>,

    /// LLM provider used for chat answers: openai or ollama.
    #[clap(long)]
    pub llm_provider: Option<String>,

    /// Base URL of the LLM provider.
    #[clap(long)]
    pub llm_url: Option<String>,

    #[clap(long)]
    pub llm_model: Option<String>,

    #[clap(long)]
    pub llm_api_key: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            media_path: args.media_path.clone(),
            port: args.port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            max_upload_mb: args.max_upload_mb,
            detector_url: args.detector_url.clone(),
            llm_provider: args.llm_provider.clone(),
            llm_url: args.llm_url.clone(),
            llm_model: args.llm_model.clone(),
            llm_api_key: args.llm_api_key.clone(),
        }
    }
}

fn build_pipeline(
    app_config: &config::AppConfig,
    providers: &[Arc<dyn LlmProvider>],
) -> AnalysisPipeline {
    let detector: Arc<dyn ObjectDetector> = match &app_config.detector.url {
        Some(url) => {
            info!("Object detector configured at {}", url);
            Arc::new(HttpObjectDetector::new(url.clone(), app_config.detector.timeout()))
        }
        None => {
            warn!("No object detector configured, frames will have no detections");
            Arc::new(NoopDetector)
        }
    };

    let attributes: Option<Arc<dyn AttributeAnalyzer>> =
        app_config.detector.attribute_url.as_ref().map(|url| {
            info!("Attribute analyzer configured at {}", url);
            Arc::new(HttpAttributeAnalyzer::new(
                url.clone(),
                app_config.detector.timeout(),
            )) as Arc<dyn AttributeAnalyzer>
        });

    let llm_captioner: Option<Arc<dyn Captioner>> = match providers.first() {
        Some(provider) if app_config.analysis.caption_with_llm => {
            info!("Captioning frames with {}", provider.name());
            Some(Arc::new(LlmCaptioner::new(
                provider.clone(),
                Duration::from_secs(app_config.llm.timeout_sec),
            )))
        }
        _ => None,
    };

    AnalysisPipeline::new(
        Arc::new(FfmpegFrameSource::new(
            app_config.analysis.ffmpeg_path.clone(),
            app_config.analysis.ffprobe_path.clone(),
        )),
        detector,
        attributes,
        CaptionChain::new(llm_captioner),
        app_config.frames_dir(),
        SamplingLimits {
            max_samples: app_config.analysis.max_samples,
            min_samples: app_config.analysis.min_samples,
        },
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  media_path: {:?}", app_config.media_path);
    info!("  port: {}", app_config.port);
    info!("  llm providers: {}", app_config.llm.providers.len());

    info!(
        "Opening SQLite video database at {:?}...",
        app_config.video_db_path()
    );
    let video_store: Arc<dyn VideoStore> =
        Arc::new(SqliteVideoStore::new(app_config.video_db_path())?);

    let file_handler = Arc::new(FileHandler::new(
        app_config.uploads_dir(),
        app_config.upload.clone(),
    ));
    file_handler
        .init()
        .await
        .with_context(|| format!("Failed to create {:?}", app_config.uploads_dir()))?;
    tokio::fs::create_dir_all(app_config.frames_dir())
        .await
        .with_context(|| format!("Failed to create {:?}", app_config.frames_dir()))?;

    let providers: Vec<Arc<dyn LlmProvider>> =
        app_config.llm.providers.iter().map(build_provider).collect();
    if providers.is_empty() {
        warn!("No LLM provider configured, chat answers will be rule based");
    }

    let shutdown_token = CancellationToken::new();
    let (hook_sender, hook_receiver) = mpsc::channel(HOOK_CHANNEL_CAPACITY);

    let pipeline = Arc::new(build_pipeline(&app_config, &providers));
    let analysis = Arc::new(
        AnalysisManager::new(video_store.clone(), pipeline, shutdown_token.child_token())
            .with_hook_sender(hook_sender.clone()),
    );
    let chat = Arc::new(VideoChatHandler::new(
        video_store.clone(),
        providers,
        &app_config.llm,
    ));

    // Set up background job scheduler
    let job_context = JobContext::new(
        shutdown_token.child_token(),
        video_store.clone(),
        analysis.clone(),
        app_config.frames_dir(),
    );
    let (mut scheduler, scheduler_handle) = create_scheduler(
        hook_sender,
        hook_receiver,
        shutdown_token.clone(),
        job_context,
    );
    let jobs_settings = &app_config.background_jobs;
    scheduler
        .register_job(Arc::new(AnalysisStatusSyncJob::new(Duration::from_secs(
            jobs_settings.status_sync_interval_sec,
        ))))
        .await;
    scheduler
        .register_job(Arc::new(OrphanFrameCleanupJob::new(Duration::from_secs(
            jobs_settings.orphan_cleanup_interval_sec,
        ))))
        .await;
    info!(
        "Job scheduler initialized with {} job(s)",
        scheduler.job_count().await
    );

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        auto_start_analysis: app_config.analysis.auto_start,
    };
    let state = ServerState::new(
        server_config,
        video_store,
        analysis,
        chat,
        file_handler,
        Some(scheduler_handle),
    );

    // Run HTTP server and job scheduler concurrently
    tokio::select! {
        result = run_server(state, shutdown_token.clone()) => {
            info!("HTTP server stopped: {:?}", result);
            shutdown_token.cancel();
            result
        },
        _ = scheduler.run() => {
            info!("Scheduler stopped");
            Ok(())
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            // Give running jobs and analyses a moment to observe the cancellation
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        }
    }
}
