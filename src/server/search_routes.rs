//! Structured search HTTP routes.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use super::api_error::ApiError;
use super::state::{GuardedVideoSearch, ServerState};
use crate::search::{
    CrossVideoResponse, FrameSearchResponse, PersonSearchResponse, TemporalAnalysisKind,
    TemporalResponse, TimeRange,
};

#[derive(Debug, Deserialize)]
pub struct FrameSearchBody {
    pub video_id: i64,
    #[serde(default)]
    pub query: String,
    /// Search this color instead of whatever the query names.
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IntraVideoBody {
    pub video_id: i64,
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct InterVideoBody {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct TemporalBody {
    pub video_id: i64,
    pub time_range: TimeRange,
    #[serde(default)]
    pub analysis_type: TemporalAnalysisKind,
}

async fn search_frames(
    State(search): State<GuardedVideoSearch>,
    Json(body): Json<FrameSearchBody>,
) -> Result<Json<FrameSearchResponse>, ApiError> {
    Ok(Json(search.search_frames(
        body.video_id,
        &body.query,
        body.color.as_deref(),
    )?))
}

/// POST /search/intra - People in one video by clothing color, gender and age
async fn search_intra_video(
    State(search): State<GuardedVideoSearch>,
    Json(body): Json<IntraVideoBody>,
) -> Result<Json<PersonSearchResponse>, ApiError> {
    Ok(Json(search.search_persons(body.video_id, &body.query)?))
}

/// POST /search/inter - Rank all analyzed videos against a query
async fn search_inter_video(
    State(search): State<GuardedVideoSearch>,
    Json(body): Json<InterVideoBody>,
) -> Result<Json<CrossVideoResponse>, ApiError> {
    Ok(Json(search.search_videos(&body.query)?))
}

async fn analyze_time_range(
    State(search): State<GuardedVideoSearch>,
    Json(body): Json<TemporalBody>,
) -> Result<Json<TemporalResponse>, ApiError> {
    Ok(Json(search.analyze_time_range(
        body.video_id,
        body.time_range,
        body.analysis_type,
    )?))
}

pub fn make_search_routes(state: ServerState) -> Router {
    Router::new()
        .route("/frames", post(search_frames))
        .route("/intra", post(search_intra_video))
        .route("/inter", post(search_inter_video))
        .route("/temporal", post(analyze_time_range))
        .with_state(state)
}
