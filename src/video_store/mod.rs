//! Persistence of videos, analysis results and chat history.

mod models;
mod schema;
mod sqlite_video_store;

pub use models::*;
pub use sqlite_video_store::SqliteVideoStore;

use anyhow::Result;

/// Trait for video storage operations.
pub trait VideoStore: Send + Sync {
    // ==================== Videos ====================

    /// Register a freshly uploaded video with status `pending`.
    fn create_video(&self, video: &NewVideo) -> Result<Video>;

    fn get_video(&self, id: i64) -> Result<Option<Video>>;

    /// All videos, newest upload first.
    fn list_videos(&self) -> Result<Vec<Video>>;

    fn list_videos_by_status(&self, status: AnalysisStatus) -> Result<Vec<Video>>;

    fn count_videos(&self) -> Result<usize>;

    /// Returns false when the video does not exist.
    fn rename_video(&self, id: i64, original_name: &str) -> Result<bool>;

    /// Delete a video and everything attached to it, returning the deleted row.
    fn delete_video(&self, id: i64) -> Result<Option<Video>>;

    /// Update status, progress (clamped to 0..=100) and message in one write.
    fn update_analysis_state(
        &self,
        id: i64,
        status: AnalysisStatus,
        progress: i64,
        message: Option<&str>,
    ) -> Result<()>;

    /// Mark the video failed with `message`, but only while its status is
    /// still `expected`. Returns whether the row changed.
    fn fail_if_status(&self, id: i64, expected: AnalysisStatus, message: &str) -> Result<bool>;

    fn set_media_info(&self, id: i64, info: &MediaInfo) -> Result<()>;

    // ==================== Analysis results ====================

    /// Replace any previous results of the video and mark it completed.
    fn save_analysis_results(&self, video_id: i64, results: &AnalysisResults) -> Result<()>;

    /// All frames of a video ordered by timestamp, with persons and objects.
    fn get_frames(&self, video_id: i64) -> Result<Vec<Frame>>;

    fn get_frames_page(&self, video_id: i64, limit: usize, offset: usize) -> Result<Vec<Frame>>;

    fn get_frame(&self, video_id: i64, image_id: i64) -> Result<Option<Frame>>;

    fn count_frames(&self, video_id: i64) -> Result<usize>;

    fn get_scenes(&self, video_id: i64) -> Result<Vec<Scene>>;

    fn get_summary(&self, video_id: i64) -> Result<Option<AnalysisSummary>>;

    /// Ids of every video row, used to detect orphaned files.
    fn list_video_ids(&self) -> Result<Vec<i64>>;

    // ==================== Chat ====================

    fn create_chat_session(&self, video_id: Option<i64>) -> Result<ChatSession>;

    fn get_chat_session(&self, id: &str) -> Result<Option<ChatSession>>;

    fn append_chat_message(
        &self,
        session_id: &str,
        role: ChatRole,
        content: &str,
        frame_ids: &[i64],
    ) -> Result<ChatMessage>;

    /// The `limit` most recent messages of a session, oldest first.
    fn get_recent_chat_messages(&self, session_id: &str, limit: usize)
        -> Result<Vec<ChatMessage>>;
}
