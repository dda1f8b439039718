use crate::analysis::AnalysisManager;
use crate::video_store::VideoStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    pub video_store: Arc<dyn VideoStore>,

    /// Knows which analyses are running right now.
    pub analysis: Arc<AnalysisManager>,

    /// Directory holding the extracted frame images.
    pub frames_dir: PathBuf,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        video_store: Arc<dyn VideoStore>,
        analysis: Arc<AnalysisManager>,
        frames_dir: PathBuf,
    ) -> Self {
        Self {
            cancellation_token,
            video_store,
            analysis,
            frames_dir,
        }
    }

    /// Same resources, different cancellation token.
    pub fn with_token(&self, cancellation_token: CancellationToken) -> Self {
        Self {
            cancellation_token,
            ..self.clone()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
