//! Video HTTP routes.
//!
//! Provides endpoints for:
//! - Uploading, listing, renaming and deleting videos
//! - Starting analyses and polling their progress
//! - Reading frames, scenes, summaries and highlights

use std::path::{Path as FsPath, PathBuf};

use axum::{
    body::Body,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::api_error::ApiError;
use super::state::{GuardedAnalysisManager, GuardedChatHandler, GuardedVideoStore, ServerState};
use crate::analysis::{frame_image_name, remove_frame_images};
use crate::chat::{Highlight, HighlightCriteria, SummaryType, VideoSummaryReport};
use crate::video_store::{AnalysisStatus, AnalysisSummary, Frame, NewVideo, Scene, Video};

/// Name of the multipart field carrying the video.
const UPLOAD_FIELD: &str = "video";

/// Room for the multipart framing around the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Upper bound on `max_highlights` accepted from clients.
const MAX_HIGHLIGHTS: usize = 100;

const MAX_FRAMES_PAGE: usize = 500;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub video: Video,
    pub analysis_started: bool,
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<Video>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub video_id: i64,
    pub upload_removed: bool,
    pub frame_images_removed: usize,
}

#[derive(Debug, Serialize)]
pub struct AnalysisStatusResponse {
    pub video_id: i64,
    pub status: AnalysisStatus,
    pub progress: i64,
    pub message: Option<String>,
    pub is_running: bool,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl AnalysisStatusResponse {
    fn new(video: &Video, is_running: bool) -> Self {
        Self {
            video_id: video.id,
            status: video.analysis_status,
            progress: video.analysis_progress,
            message: video.analysis_message.clone(),
            is_running,
            analyzed_at: video.analyzed_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StartAnalysisQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct FramesResponse {
    pub video_id: i64,
    pub frames: Vec<Frame>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct ScenesResponse {
    pub video_id: i64,
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub video_id: i64,
    pub video_name: String,
    pub summary: AnalysisSummary,
}

#[derive(Debug, Deserialize)]
pub struct SummaryBody {
    #[serde(default)]
    pub summary_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TextSummaryResponse {
    pub video_id: i64,
    pub video_name: String,
    #[serde(flatten)]
    pub report: VideoSummaryReport,
}

#[derive(Debug, Serialize)]
pub struct HighlightsResponse {
    pub video_id: i64,
    pub video_name: String,
    pub min_score: f64,
    pub highlights: Vec<Highlight>,
    pub total_highlights: usize,
}

// =============================================================================
// Helpers
// =============================================================================

/// A broken or oversized multipart body, reported with the status axum picks
/// for it (413 when the body limit was hit).
fn multipart_error(e: MultipartError) -> ApiError {
    warn!("Failed to read uploaded video: {}", e);
    ApiError::new(e.status(), format!("Failed to read upload: {}", e.body_text()))
}

fn load_video(store: &GuardedVideoStore, video_id: i64) -> Result<Video, ApiError> {
    store
        .get_video(video_id)?
        .ok_or_else(|| ApiError::not_found(format!("Video not found: {}", video_id)))
}

/// Where the JPEG of a frame lives. Stored names are relative to the frames
/// directory; frames saved without one fall back to the standard name.
fn frame_image_path(frames_dir: &FsPath, frame: &Frame) -> PathBuf {
    match frame.image_path.as_deref() {
        Some(stored) if FsPath::new(stored).is_absolute() => PathBuf::from(stored),
        Some(stored) => frames_dir.join(stored),
        None => frames_dir.join(frame_image_name(frame.video_id, frame.image_id)),
    }
}

fn load_analyzed_video(store: &GuardedVideoStore, video_id: i64) -> Result<Video, ApiError> {
    let video = load_video(store, video_id)?;
    if !video.is_analyzed() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("Video {} has not been analyzed yet", video_id),
        ));
    }
    Ok(video)
}

// =============================================================================
// Videos
// =============================================================================

/// POST /videos - Upload a video (multipart/form-data, field `video`)
async fn upload_video(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e)),
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, bytes.to_vec()));
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::bad_request("No video file provided"))?;
    debug!("Receiving upload {:?} ({} bytes)", filename, data.len());

    let stored = state.file_handler.save_upload(&filename, &data).await?;
    let new_video = NewVideo {
        filename: stored.filename.clone(),
        original_name: stored.original_name.clone(),
        file_path: stored.file_path.to_string_lossy().to_string(),
        file_size: stored.size as i64,
        content_hash: stored.content_hash.clone(),
    };
    let video = match state.video_store.create_video(&new_video) {
        Ok(video) => video,
        Err(e) => {
            if let Err(cleanup) = state.file_handler.remove_upload(&stored.file_path).await {
                warn!("Failed to remove orphaned upload {:?}: {}", stored.file_path, cleanup);
            }
            return Err(e.into());
        }
    };
    info!(
        "Stored video {} ({}, {} bytes)",
        video.id, video.original_name, video.file_size
    );

    let analysis_started = state.config.auto_start_analysis
        && match state.analysis.start_analysis(video.id, false) {
            Ok(_) => true,
            Err(e) => {
                warn!("Could not start analysis of video {}: {}", video.id, e);
                false
            }
        };

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            video,
            analysis_started,
        }),
    )
        .into_response())
}

/// GET /videos - All videos, after reconciling stale analysis states
async fn list_videos(
    State(store): State<GuardedVideoStore>,
    State(analysis): State<GuardedAnalysisManager>,
) -> Result<Json<VideoListResponse>, ApiError> {
    let report = analysis.sync_status()?;
    if report.total() > 0 {
        info!("Status sync updated {} videos", report.total());
    }
    let videos = store.list_videos()?;
    Ok(Json(VideoListResponse {
        total: videos.len(),
        videos,
    }))
}

async fn get_video(
    State(store): State<GuardedVideoStore>,
    Path(video_id): Path<i64>,
) -> Result<Json<Video>, ApiError> {
    Ok(Json(load_video(&store, video_id)?))
}

/// PUT /videos/{id}/name - Change the display name of a video
async fn rename_video(
    State(state): State<ServerState>,
    Path(video_id): Path<i64>,
    Json(body): Json<RenameBody>,
) -> Result<Json<Video>, ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Name must not be empty"));
    }
    let max_length = state.file_handler.max_name_length();
    if name.chars().count() > max_length {
        return Err(ApiError::bad_request(format!(
            "Name too long (max: {} characters)",
            max_length
        )));
    }

    if !state.video_store.rename_video(video_id, name)? {
        return Err(ApiError::not_found(format!("Video not found: {}", video_id)));
    }
    info!("Renamed video {} to {:?}", video_id, name);
    Ok(Json(load_video(&state.video_store, video_id)?))
}

/// DELETE /videos/{id} - Remove a video, its analysis rows and its files
async fn delete_video(
    State(state): State<ServerState>,
    Path(video_id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if state.analysis.cancel(video_id) {
        info!("Cancelled running analysis of video {} before deletion", video_id);
    }

    let video = state
        .video_store
        .delete_video(video_id)?
        .ok_or_else(|| ApiError::not_found(format!("Video not found: {}", video_id)))?;

    let upload_removed = match state
        .file_handler
        .remove_upload(FsPath::new(&video.file_path))
        .await
    {
        Ok(removed) => removed,
        Err(e) => {
            warn!("Failed to remove upload of video {}: {}", video_id, e);
            false
        }
    };
    let frame_images_removed = match remove_frame_images(&state.frames_dir, video_id).await {
        Ok(count) => count,
        Err(e) => {
            warn!("Failed to remove frame images of video {}: {}", video_id, e);
            0
        }
    };
    info!(
        "Deleted video {} ({} frame images removed)",
        video_id, frame_images_removed
    );

    Ok(Json(DeleteResponse {
        video_id,
        upload_removed,
        frame_images_removed,
    }))
}

// =============================================================================
// Analysis
// =============================================================================

async fn get_analysis_status(
    State(store): State<GuardedVideoStore>,
    State(analysis): State<GuardedAnalysisManager>,
    Path(video_id): Path<i64>,
) -> Result<Json<AnalysisStatusResponse>, ApiError> {
    let video = load_video(&store, video_id)?;
    Ok(Json(AnalysisStatusResponse::new(
        &video,
        analysis.is_running(video_id),
    )))
}

/// POST /videos/{id}/analysis?force=true - Start (or restart) an analysis
async fn start_analysis(
    State(store): State<GuardedVideoStore>,
    State(analysis): State<GuardedAnalysisManager>,
    Path(video_id): Path<i64>,
    Query(query): Query<StartAnalysisQuery>,
) -> Result<Response, ApiError> {
    analysis.start_analysis(video_id, query.force)?;
    let video = load_video(&store, video_id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AnalysisStatusResponse::new(&video, true)),
    )
        .into_response())
}

// =============================================================================
// Results
// =============================================================================

async fn get_frames(
    State(store): State<GuardedVideoStore>,
    Path(video_id): Path<i64>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<FramesResponse>, ApiError> {
    load_video(&store, video_id)?;
    let limit = page.limit.clamp(1, MAX_FRAMES_PAGE);
    let frames = store.get_frames_page(video_id, limit, page.offset)?;
    let total = store.count_frames(video_id)?;
    Ok(Json(FramesResponse {
        video_id,
        frames,
        total,
        limit,
        offset: page.offset,
    }))
}

/// GET /videos/{id}/frames/{image_id}/image - The stored JPEG of a frame
async fn get_frame_image(
    State(state): State<ServerState>,
    Path((video_id, image_id)): Path<(i64, i64)>,
) -> Result<Response, ApiError> {
    let frame = state
        .video_store
        .get_frame(video_id, image_id)?
        .ok_or_else(|| {
            ApiError::not_found(format!("Frame {} of video {} not found", image_id, video_id))
        })?;
    let image_path = frame_image_path(&state.frames_dir, &frame);

    let buffer = match tokio::fs::read(&image_path).await {
        Ok(buffer) => buffer,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Frame image is not available"));
        }
        Err(e) => return Err(ApiError::internal(e)),
    };

    match infer::get(&buffer) {
        Some(kind) if kind.mime_type().starts_with("image/") => Ok((
            [(header::CONTENT_TYPE, kind.mime_type())],
            Body::from(buffer),
        )
            .into_response()),
        _ => Err(ApiError::not_found("Frame image is not available")),
    }
}

async fn get_scenes(
    State(store): State<GuardedVideoStore>,
    Path(video_id): Path<i64>,
) -> Result<Json<ScenesResponse>, ApiError> {
    load_video(&store, video_id)?;
    Ok(Json(ScenesResponse {
        video_id,
        scenes: store.get_scenes(video_id)?,
    }))
}

/// GET /videos/{id}/summary - The stored analysis summary document
async fn get_summary(
    State(store): State<GuardedVideoStore>,
    Path(video_id): Path<i64>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let video = load_analyzed_video(&store, video_id)?;
    let summary = store.get_summary(video_id)?.ok_or_else(|| {
        ApiError::not_found(format!("No analysis summary for video {}", video_id))
    })?;
    Ok(Json(SummaryResponse {
        video_id,
        video_name: video.original_name,
        summary,
    }))
}

/// POST /videos/{id}/summary - Text summary of the requested depth
async fn post_summary(
    State(store): State<GuardedVideoStore>,
    State(chat): State<GuardedChatHandler>,
    Path(video_id): Path<i64>,
    Json(body): Json<SummaryBody>,
) -> Result<Json<TextSummaryResponse>, ApiError> {
    let summary_type = match body.summary_type.as_deref() {
        None => SummaryType::Comprehensive,
        Some(raw) => SummaryType::parse(raw).ok_or_else(|| {
            ApiError::bad_request(format!(
                "Unknown summary type {:?} (expected brief, detailed or comprehensive)",
                raw
            ))
        })?,
    };
    let video = load_analyzed_video(&store, video_id)?;
    let report = chat.summarize(video_id, summary_type)?;
    Ok(Json(TextSummaryResponse {
        video_id,
        video_name: video.original_name,
        report,
    }))
}

/// POST /videos/{id}/highlights - Highest scoring moments of a video
async fn post_highlights(
    State(store): State<GuardedVideoStore>,
    State(chat): State<GuardedChatHandler>,
    Path(video_id): Path<i64>,
    Json(mut criteria): Json<HighlightCriteria>,
) -> Result<Json<HighlightsResponse>, ApiError> {
    if !criteria.min_score.is_finite() || criteria.max_highlights == 0 {
        return Err(ApiError::bad_request(
            "min_score must be a number and max_highlights at least 1",
        ));
    }
    criteria.max_highlights = criteria.max_highlights.min(MAX_HIGHLIGHTS);
    load_analyzed_video(&store, video_id)?;
    let (video, highlights) = chat.highlights(video_id, &criteria)?;
    Ok(Json(HighlightsResponse {
        video_id,
        video_name: video.original_name,
        min_score: criteria.min_score,
        total_highlights: highlights.len(),
        highlights,
    }))
}

pub fn make_video_routes(state: ServerState) -> Router {
    let upload_limit = (state.file_handler.max_size_bytes() + MULTIPART_OVERHEAD_BYTES) as usize;

    Router::new()
        .route(
            "/",
            post(upload_video)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(list_videos),
        )
        .route("/{id}", get(get_video).delete(delete_video))
        .route("/{id}/name", put(rename_video))
        .route("/{id}/analysis", get(get_analysis_status).post(start_analysis))
        .route("/{id}/frames", get(get_frames))
        .route("/{id}/frames/{image_id}/image", get(get_frame_image))
        .route("/{id}/scenes", get(get_scenes))
        .route("/{id}/summary", get(get_summary).post(post_summary))
        .route("/{id}/highlights", post(post_highlights))
        .with_state(state)
}
