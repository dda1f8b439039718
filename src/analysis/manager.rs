//! Analysis Manager - owns the background task of every running analysis.
//!
//! Lifecycle of a video:
//! 1. `pending` after upload
//! 2. `analyzing` while its task runs, with progress updates
//! 3. `completed` once results are stored, or `failed` with a classified message

use super::pipeline::{AnalysisError, AnalysisPipeline, ProgressSink};
use crate::background_jobs::HookEvent;
use crate::video_store::{AnalysisStatus, MediaInfo, Video, VideoStore};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const NO_RESULTS_MESSAGE: &str = "analysis_error: no analysis results";
pub const INTERRUPTED_MESSAGE: &str = "analysis_error: analysis was interrupted";

/// Writes pipeline progress to the video row.
struct StoreProgress {
    store: Arc<dyn VideoStore>,
    video_id: i64,
}

impl ProgressSink for StoreProgress {
    fn progress(&self, percent: i64, message: &str) {
        if let Err(e) = self.store.update_analysis_state(
            self.video_id,
            AnalysisStatus::Analyzing,
            percent,
            Some(message),
        ) {
            warn!("Failed to update progress of video {}: {}", self.video_id, e);
        }
    }

    fn media_info(&self, info: &MediaInfo) {
        if let Err(e) = self.store.set_media_info(self.video_id, info) {
            warn!("Failed to store media info of video {}: {}", self.video_id, e);
        }
    }
}

/// Videos whose status was corrected by [`AnalysisManager::sync_status`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub missing_results: Vec<i64>,
    pub interrupted: Vec<i64>,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.missing_results.len() + self.interrupted.len()
    }
}

pub struct AnalysisManager {
    store: Arc<dyn VideoStore>,
    pipeline: Arc<AnalysisPipeline>,
    running: Mutex<HashMap<i64, CancellationToken>>,
    shutdown: CancellationToken,
    hook_sender: Option<mpsc::Sender<HookEvent>>,
}

impl AnalysisManager {
    pub fn new(
        store: Arc<dyn VideoStore>,
        pipeline: Arc<AnalysisPipeline>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            pipeline,
            running: Mutex::new(HashMap::new()),
            shutdown,
            hook_sender: None,
        }
    }

    /// Notify the job scheduler whenever an analysis ends.
    pub fn with_hook_sender(mut self, sender: mpsc::Sender<HookEvent>) -> Self {
        self.hook_sender = Some(sender);
        self
    }

    pub fn pipeline(&self) -> &AnalysisPipeline {
        &self.pipeline
    }

    pub fn is_running(&self, video_id: i64) -> bool {
        self.running.lock().unwrap().contains_key(&video_id)
    }

    pub fn running_count(&self) -> usize {
        self.running.lock().unwrap().len()
    }

    /// Start analyzing a video in a background task.
    ///
    /// Refuses videos that are being analyzed, and completed videos unless
    /// `force` is set.
    pub fn start_analysis(
        self: &Arc<Self>,
        video_id: i64,
        force: bool,
    ) -> Result<JoinHandle<()>, AnalysisError> {
        let video = self
            .store
            .get_video(video_id)?
            .ok_or(AnalysisError::VideoNotFound(video_id))?;

        let token = {
            let mut running = self.running.lock().unwrap();
            if running.contains_key(&video_id) {
                return Err(AnalysisError::AlreadyRunning(video_id));
            }
            match video.analysis_status {
                AnalysisStatus::Analyzing if !force => {
                    return Err(AnalysisError::AlreadyRunning(video_id))
                }
                AnalysisStatus::Completed if !force => {
                    return Err(AnalysisError::AlreadyAnalyzed(video_id))
                }
                _ => {}
            }
            let token = self.shutdown.child_token();
            running.insert(video_id, token.clone());
            token
        };

        if let Err(e) = self.store.update_analysis_state(
            video_id,
            AnalysisStatus::Analyzing,
            0,
            Some("Analysis started"),
        ) {
            self.running.lock().unwrap().remove(&video_id);
            return Err(e.into());
        }

        info!("Starting analysis of video {} (force: {})", video_id, force);
        let manager = Arc::clone(self);
        Ok(tokio::spawn(async move {
            manager.run_analysis(video, token).await;
        }))
    }

    async fn run_analysis(&self, video: Video, token: CancellationToken) {
        let video_id = video.id;
        let progress = StoreProgress {
            store: Arc::clone(&self.store),
            video_id,
        };

        let outcome = match self.pipeline.run(&video, &progress, &token).await {
            Ok(results) => self
                .store
                .save_analysis_results(video_id, &results)
                .map(|_| results.frames.len())
                .map_err(AnalysisError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(frame_count) => {
                info!("Analysis of video {} completed: {} frames", video_id, frame_count);
            }
            Err(e) => {
                let message = format!("{}: {}", e.kind(), e);
                error!("Analysis of video {} failed: {}", video_id, message);
                if let Err(store_err) = self.store.update_analysis_state(
                    video_id,
                    AnalysisStatus::Failed,
                    0,
                    Some(&message),
                ) {
                    error!("Failed to mark video {} as failed: {}", video_id, store_err);
                }
            }
        }

        self.running.lock().unwrap().remove(&video_id);
        if let Some(sender) = &self.hook_sender {
            if sender.try_send(HookEvent::OnAnalysisFinished).is_err() {
                warn!("Job scheduler did not accept analysis hook");
            }
        }
    }

    /// Request cancellation of a running analysis.
    pub fn cancel(&self, video_id: i64) -> bool {
        match self.running.lock().unwrap().get(&video_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Fail the listed videos that have no running task. The list may be stale:
    /// a task can finish between listing and this check, so only rows still
    /// `analyzing` are touched.
    fn fail_abandoned(&self, candidates: &[Video], report: &mut SyncReport) -> Result<()> {
        for video in candidates {
            if self.is_running(video.id) {
                continue;
            }
            if self
                .store
                .fail_if_status(video.id, AnalysisStatus::Analyzing, INTERRUPTED_MESSAGE)?
            {
                warn!("Video {} was left analyzing without a task", video.id);
                report.interrupted.push(video.id);
            }
        }
        Ok(())
    }

    /// Fix statuses that disagree with the stored results:
    /// completed videos without frames and analyses with no running task fail.
    pub fn sync_status(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        let completed = self.store.list_videos_by_status(AnalysisStatus::Completed)?;
        for video in completed {
            if self.store.count_frames(video.id)? == 0
                && self.store.fail_if_status(
                    video.id,
                    AnalysisStatus::Completed,
                    NO_RESULTS_MESSAGE,
                )?
            {
                warn!("Video {} is completed but has no results", video.id);
                report.missing_results.push(video.id);
            }
        }

        let analyzing = self.store.list_videos_by_status(AnalysisStatus::Analyzing)?;
        self.fail_abandoned(&analyzing, &mut report)?;

        Ok(report)
    }
}
