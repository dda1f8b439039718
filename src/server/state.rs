use axum::extract::FromRef;

use crate::analysis::AnalysisManager;
use crate::background_jobs::SchedulerHandle;
use crate::chat::VideoChatHandler;
use crate::media::FileHandler;
use crate::search::VideoSearch;
use crate::video_store::VideoStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedVideoStore = Arc<dyn VideoStore>;
pub type GuardedAnalysisManager = Arc<AnalysisManager>;
pub type GuardedChatHandler = Arc<VideoChatHandler>;
pub type GuardedVideoSearch = Arc<VideoSearch>;
pub type GuardedFileHandler = Arc<FileHandler>;
pub type OptionalSchedulerHandle = Option<SchedulerHandle>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub video_store: GuardedVideoStore,
    pub analysis: GuardedAnalysisManager,
    pub chat: GuardedChatHandler,
    pub search: GuardedVideoSearch,
    pub file_handler: GuardedFileHandler,
    /// Where extracted frame images are written.
    pub frames_dir: PathBuf,
    pub scheduler_handle: OptionalSchedulerHandle,
}

impl ServerState {
    /// State over one store; chat and search are built on top of it.
    pub fn new(
        config: ServerConfig,
        video_store: GuardedVideoStore,
        analysis: GuardedAnalysisManager,
        chat: GuardedChatHandler,
        file_handler: GuardedFileHandler,
        scheduler_handle: OptionalSchedulerHandle,
    ) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            hash: env!("GIT_HASH").to_string(),
            search: Arc::new(VideoSearch::new(video_store.clone())),
            frames_dir: analysis.pipeline().frames_dir().to_path_buf(),
            video_store,
            analysis,
            chat,
            file_handler,
            scheduler_handle,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedVideoStore {
    fn from_ref(input: &ServerState) -> Self {
        input.video_store.clone()
    }
}

impl FromRef<ServerState> for GuardedAnalysisManager {
    fn from_ref(input: &ServerState) -> Self {
        input.analysis.clone()
    }
}

impl FromRef<ServerState> for GuardedChatHandler {
    fn from_ref(input: &ServerState) -> Self {
        input.chat.clone()
    }
}

impl FromRef<ServerState> for GuardedVideoSearch {
    fn from_ref(input: &ServerState) -> Self {
        input.search.clone()
    }
}

impl FromRef<ServerState> for GuardedFileHandler {
    fn from_ref(input: &ServerState) -> Self {
        input.file_handler.clone()
    }
}

impl FromRef<ServerState> for OptionalSchedulerHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler_handle.clone()
    }
}
