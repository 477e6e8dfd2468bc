//! Read query endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use meterline_core::normalize::parse_timestamp;
use meterline_core::{BuildingSummary, Device, EventIdentity, Measurement, RawEvent};
use meterline_ingest::TimeRange;
use serde::Deserialize;

use super::blocking;
use crate::error::ApiError;
use crate::state::AppState;

/// Identifies one stream.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub device_id: String,
    pub metric_type: String,
}

#[derive(Debug, Deserialize)]
pub struct TimeseriesParams {
    pub device_id: String,
    pub metric_type: String,
    /// Inclusive RFC 3339 lower bound.
    pub start: String,
    /// Inclusive RFC 3339 upper bound.
    pub end: String,
}

#[derive(Debug, Deserialize)]
pub struct DeviceParams {
    pub building_id: Option<String>,
}

/// `GET /api/v1/latest?device_id=..&metric_type=..`
pub async fn latest(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Json<Measurement>, ApiError> {
    let StreamParams {
        device_id,
        metric_type,
    } = params;
    let not_found = format!("no {metric_type} measurements for device '{device_id}'");

    blocking(&state, move |ingestor| {
        ingestor.store().latest(&device_id, &metric_type)
    })
    .await?
    .map(Json)
    .ok_or(ApiError::NotFound(not_found))
}

/// `GET /api/v1/timeseries?device_id=..&metric_type=..&start=..&end=..`
///
/// Returns measurements in ascending timestamp order.
pub async fn timeseries(
    State(state): State<AppState>,
    Query(params): Query<TimeseriesParams>,
) -> Result<Json<Vec<Measurement>>, ApiError> {
    let start = parse_timestamp(&params.start).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let end = parse_timestamp(&params.end).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let range = TimeRange::new(start, end).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let measurements = blocking(&state, move |ingestor| {
        ingestor
            .store()
            .timeseries(&params.device_id, &params.metric_type, range)
    })
    .await?;

    Ok(Json(measurements))
}

/// `GET /api/v1/buildings`
pub async fn buildings(State(state): State<AppState>) -> Result<Json<Vec<BuildingSummary>>, ApiError> {
    let buildings = blocking(&state, |ingestor| ingestor.store().buildings()).await?;
    Ok(Json(buildings))
}

/// `GET /api/v1/devices[?building_id=..]`
pub async fn devices(
    State(state): State<AppState>,
    Query(params): Query<DeviceParams>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = blocking(&state, move |ingestor| {
        ingestor.store().devices(params.building_id.as_deref())
    })
    .await?;
    Ok(Json(devices))
}

/// `GET /api/v1/raw-events/{event_id}`
pub async fn raw_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<RawEvent>, ApiError> {
    let identity: EventIdentity = event_id
        .parse()
        .map_err(|e: meterline_core::Error| ApiError::BadRequest(e.to_string()))?;

    blocking(&state, move |ingestor| ingestor.store().raw_event(&identity))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("raw event {event_id}")))
}
