//! Mapping of subsystem errors to JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::analysis::AnalysisError;
use crate::chat::ChatError;
use crate::media::UploadError;
use crate::search::SearchError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error on its way to the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        error!("Request failed: {}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal(format!("{:#}", err))
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::VideoNotFound(_) => ApiError::not_found(err.to_string()),
            AnalysisError::AlreadyRunning(_) | AnalysisError::AlreadyAnalyzed(_) => {
                ApiError::new(StatusCode::CONFLICT, err.to_string())
            }
            _ => ApiError::internal(err),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => ApiError::bad_request(err.to_string()),
            ChatError::VideoNotFound(_) | ChatError::SessionNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            ChatError::Store(_) => ApiError::internal(err),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::EmptyQuery | SearchError::NoCriteria | SearchError::InvalidTimeRange => {
                ApiError::bad_request(err.to_string())
            }
            SearchError::VideoNotFound(_) => ApiError::not_found(err.to_string()),
            SearchError::NotAnalyzed(_) => ApiError::new(StatusCode::CONFLICT, err.to_string()),
            SearchError::Store(_) => ApiError::internal(err),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        if err.is_client_error() {
            ApiError::bad_request(err.to_string())
        } else {
            ApiError::internal(err)
        }
    }
}
