//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own database and media dir.

use super::constants::*;
use super::fixtures::{FixedAttributes, StreetDetector, StreetFrameSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use video_chat_server::analysis::{
    AnalysisManager, AnalysisPipeline, CaptionChain, SamplingLimits,
};
use video_chat_server::background_jobs::jobs::{AnalysisStatusSyncJob, OrphanFrameCleanupJob};
use video_chat_server::background_jobs::{create_scheduler, JobContext};
use video_chat_server::chat::VideoChatHandler;
use video_chat_server::config::{LlmSettings, UploadSettings};
use video_chat_server::media::FileHandler;
use video_chat_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use video_chat_server::video_store::{SqliteVideoStore, VideoStore};

/// Test server instance with isolated database and media directory
///
/// When dropped, the server and its job scheduler shut down and temp
/// resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Video store for direct database access in tests
    pub video_store: Arc<dyn VideoStore>,

    /// Where frame images are written
    pub frames_dir: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a server that starts analyzing every upload right away.
    pub async fn spawn() -> Self {
        Self::spawn_with(true, UploadSettings::default()).await
    }

    /// Spawns a server where analyses only start on request.
    pub async fn spawn_without_auto_analysis() -> Self {
        Self::spawn_with(false, UploadSettings::default()).await
    }

    /// Spawns a server that accepts uploads of at most `max_size_bytes`.
    pub async fn spawn_with_upload_limit(max_size_bytes: u64) -> Self {
        let uploads = UploadSettings {
            max_size_bytes,
            ..UploadSettings::default()
        };
        Self::spawn_with(true, uploads).await
    }

    /// # Panics
    ///
    /// Panics if the database cannot be created, the port cannot be bound
    /// or the server doesn't become ready within timeout.
    async fn spawn_with(auto_start_analysis: bool, uploads: UploadSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let frames_dir = temp_dir.path().join("frames");

        let video_store: Arc<dyn VideoStore> = Arc::new(
            SqliteVideoStore::new(temp_dir.path().join("videos.db"))
                .expect("Failed to open video store"),
        );

        let shutdown = CancellationToken::new();
        let (hook_sender, hook_receiver) = mpsc::channel(16);

        let pipeline = Arc::new(AnalysisPipeline::new(
            Arc::new(StreetFrameSource {
                frame_count: TEST_VIDEO_FRAMES,
                fps: TEST_VIDEO_FPS,
            }),
            Arc::new(StreetDetector),
            Some(Arc::new(FixedAttributes)),
            CaptionChain::rules_only(),
            frames_dir.clone(),
            SamplingLimits::default(),
        ));
        let analysis = Arc::new(
            AnalysisManager::new(video_store.clone(), pipeline, shutdown.child_token())
                .with_hook_sender(hook_sender.clone()),
        );
        let chat = Arc::new(VideoChatHandler::new(
            video_store.clone(),
            Vec::new(),
            &LlmSettings::default(),
        ));
        let file_handler = Arc::new(FileHandler::new(
            temp_dir.path().join("uploads"),
            uploads,
        ));

        let job_context = JobContext::new(
            shutdown.child_token(),
            video_store.clone(),
            analysis.clone(),
            frames_dir.clone(),
        );
        let (mut scheduler, scheduler_handle) =
            create_scheduler(hook_sender, hook_receiver, shutdown.clone(), job_context);
        scheduler
            .register_job(Arc::new(AnalysisStatusSyncJob::new(Duration::from_secs(3600))))
            .await;
        scheduler
            .register_job(Arc::new(OrphanFrameCleanupJob::new(Duration::from_secs(3600))))
            .await;
        tokio::spawn(async move { scheduler.run().await });

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
            auto_start_analysis,
        };
        let state = ServerState::new(
            config,
            video_store.clone(),
            analysis,
            chat,
            file_handler,
            Some(scheduler_handle),
        );
        let app = make_app(state);

        // Spawn server in background task with graceful shutdown
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(server_shutdown.cancelled_owned())
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            video_store,
            frames_dir,
            _temp_dir: temp_dir,
            shutdown,
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        // TempDir will be cleaned up automatically
    }
}
