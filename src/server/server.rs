use anyhow::{Context, Result};
use std::time::Duration;

use axum::{extract::State, middleware, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::info;

use super::api_error::ApiError;
use super::chat_routes::make_chat_routes;
use super::search_routes::make_search_routes;
use super::state::ServerState;
use super::video_routes::make_video_routes;
use super::log_requests;
use crate::background_jobs::JobInfo;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub video_count: usize,
    pub running_analyses: usize,
    pub llm_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<JobInfo>>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> Result<impl IntoResponse, ApiError> {
    let jobs = match &state.scheduler_handle {
        Some(handle) => Some(handle.list_jobs().await),
        None => None,
    };
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        video_count: state.video_store.count_videos()?,
        running_analyses: state.analysis.running_count(),
        llm_enabled: state.chat.has_llm(),
        jobs,
    };
    Ok(Json(stats))
}

pub fn make_app(state: ServerState) -> Router {
    let home_router: Router = match &state.config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let stats_routes: Router = Router::new()
        .route("/v1/stats", get(home))
        .with_state(state.clone());

    home_router
        .merge(stats_routes)
        .nest("/v1/videos", make_video_routes(state.clone()))
        .nest("/v1/chat", make_chat_routes(state.clone()))
        .nest("/v1/search", make_search_routes(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            log_requests,
        ))
}

/// Serve until `shutdown` is cancelled.
pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Ready to serve at port {}!", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
