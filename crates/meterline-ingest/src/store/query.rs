//! Read-side queries over committed state.

use chrono::{DateTime, Utc};
use meterline_core::{Building, BuildingSummary, Device, EventIdentity, Measurement, RawEvent};
use rusqlite::{OptionalExtension, params};

use super::{
    MEASUREMENT_COLUMNS, MeasurementRow, MeasurementStore, RAW_EVENT_COLUMNS, RawEventRow,
    from_micros, to_micros,
};
use crate::Result;

/// Inclusive time window for series queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range; `start` must be strictly before `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> meterline_core::Result<Self> {
        if start >= end {
            return Err(meterline_core::Error::validation(
                "start",
                "start time must be before end time",
            ));
        }
        Ok(Self { start, end })
    }
}

impl MeasurementStore {
    /// Most recent measurement of a stream, if any.
    pub fn latest(&self, device_id: &str, metric_type: &str) -> Result<Option<Measurement>> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {MEASUREMENT_COLUMNS} FROM normalized_measurements
                 WHERE device_id = ? AND metric_type = ?
                 ORDER BY ts DESC LIMIT 1"
            );
            conn.query_row(&sql, params![device_id, metric_type], MeasurementRow::from_row)
                .optional()?
                .map(MeasurementRow::decode)
                .transpose()
        })
    }

    /// Measurements of a stream within `range` (inclusive), oldest first.
    pub fn timeseries(
        &self,
        device_id: &str,
        metric_type: &str,
        range: TimeRange,
    ) -> Result<Vec<Measurement>> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {MEASUREMENT_COLUMNS} FROM normalized_measurements
                 WHERE device_id = ? AND metric_type = ? AND ts >= ? AND ts <= ?
                 ORDER BY ts ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![
                    device_id,
                    metric_type,
                    to_micros(&range.start),
                    to_micros(&range.end)
                ],
                MeasurementRow::from_row,
            )?;

            let mut measurements = Vec::new();
            for row in rows {
                measurements.push(row?.decode()?);
            }
            Ok(measurements)
        })
    }

    /// All buildings with their device counts, ordered by id.
    pub fn buildings(&self) -> Result<Vec<BuildingSummary>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT b.building_id, b.name, b.address, b.created_at, COUNT(d.device_id)
                 FROM buildings b
                 LEFT JOIN devices d ON d.building_id = b.building_id
                 GROUP BY b.building_id
                 ORDER BY b.building_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?;

            let mut buildings = Vec::new();
            for row in rows {
                let (building_id, name, address, created_at, device_count) = row?;
                buildings.push(BuildingSummary {
                    building: Building {
                        building_id,
                        name,
                        address,
                        created_at: from_micros(created_at)?,
                    },
                    device_count: device_count.max(0) as u64,
                });
            }
            Ok(buildings)
        })
    }

    /// Devices, optionally restricted to one building, ordered by id.
    pub fn devices(&self, building_id: Option<&str>) -> Result<Vec<Device>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT device_id, building_id, name, location, device_type, created_at
                 FROM devices
                 WHERE ?1 IS NULL OR building_id = ?1
                 ORDER BY device_id",
            )?;
            let rows = stmt.query_map([building_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?;

            let mut devices = Vec::new();
            for row in rows {
                let (device_id, building_id, name, location, device_type, created_at) = row?;
                devices.push(Device {
                    device_id,
                    building_id,
                    name,
                    location,
                    device_type,
                    created_at: from_micros(created_at)?,
                });
            }
            Ok(devices)
        })
    }

    /// The archived raw event with this identity.
    pub fn raw_event(&self, event_id: &EventIdentity) -> Result<Option<RawEvent>> {
        self.with_connection(|conn| {
            let sql = format!("SELECT {RAW_EVENT_COLUMNS} FROM raw_events WHERE event_id = ?");
            conn.query_row(&sql, [event_id.to_hex()], RawEventRow::from_row)
                .optional()?
                .map(RawEventRow::decode)
                .transpose()
        })
    }

    /// Number of stored measurements.
    pub fn measurement_count(&self) -> Result<u64> {
        self.with_connection(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM normalized_measurements", [], |row| {
                    row.get(0)
                })?;
            Ok(count.max(0) as u64)
        })
    }
}
