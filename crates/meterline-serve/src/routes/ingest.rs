//! Reading ingestion endpoint.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use meterline_core::{EventIdentity, IngestRequest, Measurement};
use meterline_ingest::{IngestOutcome, StorageFailureKind};
use serde::Serialize;

use super::blocking;
use crate::error::{ApiError, retry_after};
use crate::state::AppState;

/// Body for created and duplicate outcomes.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub event_id: EventIdentity,
    pub measurement: Measurement,
}

/// Body for rejected, conflicting and failed outcomes.
#[derive(Debug, Serialize)]
pub struct IngestErrorResponse {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<Measurement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,
}

impl IngestErrorResponse {
    fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            existing: None,
            stage: None,
        }
    }
}

/// `POST /api/v1/ingest`
///
/// Runs one reading through the pipeline. Status codes:
/// - `201` created, `200` already ingested (body carries the stored measurement)
/// - `400` malformed reading or unsupported unit
/// - `409` a different reading occupies the timestamp
/// - `503` storage failure, safe to retry
pub async fn ingest(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            let body = IngestErrorResponse::new("invalid_json", rejection.body_text());
            return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
        }
    };

    let outcome = blocking(&state, move |ingestor| Ok(ingestor.ingest(&request))).await?;
    Ok(outcome_response(outcome))
}

fn outcome_response(outcome: IngestOutcome) -> Response {
    match outcome {
        IngestOutcome::Created(measurement) => accepted(StatusCode::CREATED, "created", measurement),
        IngestOutcome::Duplicate(measurement) => accepted(StatusCode::OK, "duplicate", measurement),
        IngestOutcome::Rejected(err) => {
            let error = match err {
                meterline_core::Error::UnsupportedUnit { .. } => "unsupported_unit",
                meterline_core::Error::Json(_) => "invalid_json",
                meterline_core::Error::Validation { .. } => "validation_error",
            };
            let body = IngestErrorResponse::new(error, err.to_string());
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        IngestOutcome::Conflict(conflict) => {
            let message = conflict.to_string();
            let body = IngestErrorResponse {
                existing: Some(conflict.existing),
                ..IngestErrorResponse::new("conflict", message)
            };
            (StatusCode::CONFLICT, Json(body)).into_response()
        }
        IngestOutcome::Failed(failure) => {
            let error = match failure.kind {
                StorageFailureKind::Contention => "storage_contention",
                StorageFailureKind::Unavailable => "storage_unavailable",
            };
            let body = IngestErrorResponse {
                stage: Some(failure.stage.as_str()),
                ..IngestErrorResponse::new(error, "Storage is temporarily unavailable, retry later")
            };
            retry_after((StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response())
        }
    }
}

fn accepted(status: StatusCode, label: &'static str, measurement: Measurement) -> Response {
    let body = AcceptedResponse {
        status: label,
        event_id: measurement.raw_event_id,
        measurement,
    };
    (status, Json(body)).into_response()
}
