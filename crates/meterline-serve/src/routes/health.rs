//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use super::blocking;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: &'static str,
    version: &'static str,
}

/// `GET /health`
///
/// Reports `ok` when the measurement store answers a ping and `degraded`
/// (with 503) when it does not. Use this for load balancer health probes.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ping = blocking(&state, |ingestor| ingestor.store().ping()).await;

    let (status, overall, database) = match ping {
        Ok(()) => (StatusCode::OK, "ok", "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "health check: storage ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: overall,
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
