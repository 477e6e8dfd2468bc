//! Stored record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EventIdentity, QualityFlags};

/// A normalized, queryable measurement.
///
/// There is at most one measurement per `(device_id, metric_type,
/// timestamp)`. Within a stream the delta always refers to the
/// immediately preceding measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: i64,
    /// Identity of the raw event this measurement was derived from.
    pub raw_event_id: EventIdentity,
    pub device_id: String,
    pub building_id: String,
    pub metric_type: String,
    /// Normalized timestamp (UTC, microsecond precision).
    pub timestamp: DateTime<Utc>,
    /// Canonical value in [`crate::CANONICAL_UNIT`].
    pub value: f64,
    pub unit: String,
    /// Consumption since the predecessor; `None` for first readings and resets.
    pub delta_value: Option<f64>,
    pub quality_flags: QualityFlags,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit record of an accepted ingestion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_id: EventIdentity,
    pub device_id: String,
    pub building_id: String,
    /// Timestamp string exactly as received.
    pub timestamp: String,
    pub metric_type: String,
    pub value: f64,
    /// Unit exactly as received.
    pub unit: String,
    /// Complete original payload.
    pub raw_payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Device metadata, registered the first time a device reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub building_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub device_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Building metadata, registered the first time one of its devices reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub building_id: String,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A building together with the number of devices registered to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSummary {
    #[serde(flatten)]
    pub building: Building,
    pub device_count: u64,
}
