use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::attempt::AttemptError;
use crate::store::StoreError;

/// Error body returned by every JSON endpoint on failure.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Human-readable description, shown verbatim by the command-line client.
    #[schema(example = "duplicate of previous iteration")]
    pub error: String,
}

/// Application-level error type for the JSON API.
#[derive(Debug)]
pub enum AppError {
    /// Empty or malformed body, or a legacy path the server cannot resolve.
    InvalidPayload(String),
    /// Missing, unknown or guest API key.
    Authentication(String),
    NotFound(String),
    UnknownProblem(String),
    Duplicate(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let (status, error) = match self {
            AppError::InvalidPayload(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::UnknownProblem(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Duplicate(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".into(),
                )
            }
        };
        (status, ErrorBody { error })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<AttemptError> for AppError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::InvalidPayload(msg) => AppError::InvalidPayload(msg),
            e @ AttemptError::UnknownKey(_) => AppError::Authentication(e.to_string()),
            e @ AttemptError::UnknownProblem { .. } => AppError::UnknownProblem(e.to_string()),
            e @ AttemptError::Duplicate => AppError::Duplicate(e.to_string()),
            AttemptError::Store(e) => e.into(),
        }
    }
}
