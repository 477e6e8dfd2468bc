//! Ingest request shape and validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::{check_finite, parse_timestamp};
use crate::{Error, EventIdentity, MAX_ID_LEN, Result};

/// A telemetry reading as submitted by a device or gateway.
///
/// Unknown fields are kept in `extra` so the full payload can be
/// archived with the raw event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub device_id: String,
    pub building_id: String,
    /// RFC 3339 timestamp with an explicit offset.
    pub timestamp: String,
    pub metric_type: String,
    pub value: f64,
    pub unit: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl IngestRequest {
    /// Parse a request from a single JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The complete request as a JSON value, for the audit log.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Null)
    }

    /// Check field shapes, parse the timestamp, and reject non-finite values.
    ///
    /// The unit is not checked here; unit conversion happens
    /// after deduplication.
    pub fn validate(&self) -> Result<ValidatedRequest<'_>> {
        check_id("device_id", &self.device_id)?;
        check_id("building_id", &self.building_id)?;
        check_non_empty("metric_type", &self.metric_type)?;
        check_non_empty("unit", &self.unit)?;
        check_finite(self.value)?;
        let timestamp = parse_timestamp(&self.timestamp)?;

        Ok(ValidatedRequest {
            request: self,
            timestamp,
        })
    }
}

/// A request whose fields passed validation, with its UTC timestamp.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedRequest<'a> {
    pub request: &'a IngestRequest,
    pub timestamp: DateTime<Utc>,
}

impl ValidatedRequest<'_> {
    /// Deterministic identity used for deduplication.
    pub fn identity(&self) -> EventIdentity {
        EventIdentity::derive(
            &self.request.device_id,
            &self.timestamp,
            &self.request.metric_type,
            self.request.value,
        )
    }
}

fn check_id(field: &'static str, value: &str) -> Result<()> {
    check_non_empty(field, value)?;
    let len = value.chars().count();
    if len > MAX_ID_LEN {
        return Err(Error::validation(
            field,
            format!("{len} characters exceeds the maximum of {MAX_ID_LEN}"),
        ));
    }
    Ok(())
}

fn check_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    Ok(())
}
