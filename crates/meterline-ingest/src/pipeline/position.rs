//! Sequence Positioner.
//!
//! Finds where a timestamp falls in a `(device_id, metric_type)` stream:
//! the closest stored measurement strictly before it and the closest one
//! strictly after it. A measurement at exactly the same timestamp is a
//! conflict, never a merge.

use chrono::{DateTime, Utc};
use meterline_core::{Measurement, Placement, Reading};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::ConflictError;
use crate::store::{MEASUREMENT_COLUMNS, MeasurementRow, to_micros};
use crate::Result;

/// The immediate neighbors of a timestamp within one stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbors {
    /// Greatest timestamp strictly less than the target.
    pub predecessor: Option<Measurement>,
    /// Smallest timestamp strictly greater than the target.
    pub successor: Option<Measurement>,
}

impl Neighbors {
    pub fn placement(&self) -> Placement {
        Placement::classify(self.predecessor.is_some(), self.successor.is_some())
    }

    pub fn predecessor_value(&self) -> Option<f64> {
        self.predecessor.as_ref().map(|m| m.value)
    }

    pub fn successor_reading(&self) -> Option<Reading> {
        self.successor.as_ref().map(|m| Reading {
            value: m.value,
            flags: m.quality_flags,
        })
    }
}

/// Locate `timestamp` in the stream of `device_id` / `metric_type`.
///
/// Fails with a conflict if a measurement already exists at `timestamp`.
pub fn locate(
    conn: &Connection,
    device_id: &str,
    metric_type: &str,
    timestamp: &DateTime<Utc>,
) -> Result<Neighbors> {
    let ts = to_micros(timestamp);

    let at = neighbor(conn, "ts = ?3", "", device_id, metric_type, ts)?;
    if let Some(existing) = at {
        return Err(ConflictError {
            device_id: device_id.to_string(),
            metric_type: metric_type.to_string(),
            timestamp: *timestamp,
            existing,
        }
        .into());
    }

    Ok(Neighbors {
        predecessor: neighbor(conn, "ts < ?3", "ORDER BY ts DESC", device_id, metric_type, ts)?,
        successor: neighbor(conn, "ts > ?3", "ORDER BY ts ASC", device_id, metric_type, ts)?,
    })
}

fn neighbor(
    conn: &Connection,
    condition: &str,
    order: &str,
    device_id: &str,
    metric_type: &str,
    ts: i64,
) -> Result<Option<Measurement>> {
    let sql = format!(
        "SELECT {MEASUREMENT_COLUMNS} FROM normalized_measurements
         WHERE device_id = ?1 AND metric_type = ?2 AND {condition}
         {order} LIMIT 1"
    );
    conn.query_row(&sql, params![device_id, metric_type, ts], MeasurementRow::from_row)
        .optional()?
        .map(MeasurementRow::decode)
        .transpose()
}
