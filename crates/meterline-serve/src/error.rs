//! API error types and response formatting.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use meterline_ingest::StorageFailureKind;
use serde::Serialize;

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Storage error from the ingest crate.
    #[error("storage error: {0}")]
    Storage(#[from] meterline_ingest::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Attach `Retry-After: 1` to a response for a retryable failure.
pub(crate) fn retry_after(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    response
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone())),
            Self::Storage(err) => match err.storage_failure() {
                Some(kind) => {
                    tracing::error!(error = %err, kind = kind.as_str(), "storage failure");
                    let error = match kind {
                        StorageFailureKind::Contention => "storage_contention",
                        StorageFailureKind::Unavailable => "storage_unavailable",
                    };
                    let body = ErrorResponse {
                        error: error.to_string(),
                        message: Some("Storage is temporarily unavailable, retry later".to_string()),
                    };
                    return retry_after((StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response());
                }
                None => (StatusCode::BAD_REQUEST, "bad_request", Some(err.to_string())),
            },
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    Some("An internal error occurred".to_string()),
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
