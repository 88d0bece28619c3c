use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Missing source URL")]
    MissingSourceUrl,
    #[error("Job not found")]
    JobNotFound,
    #[error("Job not completed")]
    JobNotCompleted,
    #[error("File not found")]
    FileNotFound,
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSourceUrl | Self::JobNotCompleted => StatusCode::BAD_REQUEST,
            Self::JobNotFound | Self::FileNotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
