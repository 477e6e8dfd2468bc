//! API route definitions.

mod health;
mod ingest;
mod query;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use meterline_ingest::Ingestor;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the complete API router.
///
/// # Route Structure
///
/// - `GET /health` - Health check including a storage ping
///
/// ## API v1
/// - `POST /api/v1/ingest` - Ingest one reading
/// - `GET /api/v1/latest` - Most recent measurement of a stream
/// - `GET /api/v1/timeseries` - Measurements of a stream in a time range
/// - `GET /api/v1/buildings` - Buildings with device counts
/// - `GET /api/v1/devices` - Devices, optionally filtered by building
/// - `GET /api/v1/raw-events/{event_id}` - Archived raw event by identity
pub fn router(state: AppState) -> Router {
    let public = Router::new().route("/health", get(health::health_check));

    let api_v1 = Router::new()
        .route("/ingest", post(ingest::ingest))
        .route("/latest", get(query::latest))
        .route("/timeseries", get(query::timeseries))
        .route("/buildings", get(query::buildings))
        .route("/devices", get(query::devices))
        .route("/raw-events/{event_id}", get(query::raw_event));

    Router::new()
        .merge(public)
        .nest("/api/v1", api_v1)
        .with_state(state)
}

/// Run blocking storage work off the async executor.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Ingestor) -> meterline_ingest::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let ingestor = Arc::clone(&state.ingestor);
    let result = tokio::task::spawn_blocking(move || f(&ingestor))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))?;
    Ok(result?)
}
