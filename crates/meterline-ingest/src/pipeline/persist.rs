//! Persister.
//!
//! Applies a closed [`WriteSet`] inside the caller's transaction: one raw
//! event insert, one measurement insert, and at most one successor update,
//! plus create-on-first-seen registration of the building and device.
//! The caller commits or rolls back the whole set.

use chrono::{DateTime, Utc};
use meterline_core::{CANONICAL_UNIT, Measurement, QualityFlags, RawEvent};
use rusqlite::{Connection, ErrorCode, params};

use crate::pipeline::position;
use crate::store::to_micros;
use crate::{Error, Result};

/// A measurement about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub device_id: String,
    pub building_id: String,
    pub metric_type: String,
    pub timestamp: DateTime<Utc>,
    /// Canonical value.
    pub value: f64,
    pub delta_value: Option<f64>,
    pub quality_flags: QualityFlags,
}

/// Revised delta and flags for an already-stored measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuccessorUpdate {
    pub id: i64,
    pub delta_value: Option<f64>,
    pub quality_flags: QualityFlags,
}

/// Everything one accepted reading writes.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSet {
    pub raw_event: RawEvent,
    pub measurement: NewMeasurement,
    pub successor_update: Option<SuccessorUpdate>,
}

/// Apply `writes` and return the stored measurement.
///
/// Unique violations are reported as [`Error::DuplicateIdentity`] when the
/// raw event identity already exists and as [`Error::Conflict`] when the
/// stream already holds the timestamp. Any other failure is returned as is.
pub fn apply(conn: &Connection, writes: &WriteSet) -> Result<Measurement> {
    let raw = &writes.raw_event;
    let new = &writes.measurement;
    let created_at = raw.received_at;

    register_metadata(conn, &raw.building_id, &raw.device_id, &created_at)?;

    let payload = serde_json::to_string(&raw.raw_payload)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT INTO raw_events
         (event_id, device_id, building_id, timestamp, metric_type, value, unit, raw_payload, received_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            raw.event_id.to_hex(),
            raw.device_id,
            raw.building_id,
            raw.timestamp,
            raw.metric_type,
            raw.value,
            raw.unit,
            payload,
            to_micros(&raw.received_at),
        ],
    )
    .map_err(|e| unique_violation(conn, e, writes))?;

    conn.execute(
        "INSERT INTO normalized_measurements
         (raw_event_id, device_id, building_id, metric_type, ts, value, unit, delta_value, quality_flags, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            raw.event_id.to_hex(),
            new.device_id,
            new.building_id,
            new.metric_type,
            to_micros(&new.timestamp),
            new.value,
            CANONICAL_UNIT,
            new.delta_value,
            new.quality_flags.bits(),
            to_micros(&created_at),
        ],
    )
    .map_err(|e| unique_violation(conn, e, writes))?;
    let id = conn.last_insert_rowid();

    if let Some(update) = &writes.successor_update {
        let changed = conn.execute(
            "UPDATE normalized_measurements SET delta_value = ?, quality_flags = ? WHERE id = ?",
            params![update.delta_value, update.quality_flags.bits(), update.id],
        )?;
        if changed != 1 {
            return Err(Error::Corrupt(format!(
                "successor measurement {} disappeared during update",
                update.id
            )));
        }
    }

    Ok(Measurement {
        id,
        raw_event_id: raw.event_id,
        device_id: new.device_id.clone(),
        building_id: new.building_id.clone(),
        metric_type: new.metric_type.clone(),
        timestamp: new.timestamp,
        value: new.value,
        unit: CANONICAL_UNIT.to_string(),
        delta_value: new.delta_value,
        quality_flags: new.quality_flags,
        created_at,
    })
}

/// Register the building and device if they have never reported before.
///
/// Existing rows are left untouched; a device keeps the building it was
/// first seen with.
fn register_metadata(
    conn: &Connection,
    building_id: &str,
    device_id: &str,
    now: &DateTime<Utc>,
) -> Result<()> {
    let now = to_micros(now);
    conn.execute(
        "INSERT OR IGNORE INTO buildings (building_id, name, created_at) VALUES (?1, ?1, ?2)",
        params![building_id, now],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO devices (device_id, building_id, name, created_at)
         VALUES (?1, ?2, ?1, ?3)",
        params![device_id, building_id, now],
    )?;
    Ok(())
}

/// Translate a uniqueness violation into the outcome it stands for.
fn unique_violation(conn: &Connection, err: rusqlite::Error, writes: &WriteSet) -> Error {
    let message = match &err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) if e.code == ErrorCode::ConstraintViolation => {
            msg.as_str()
        }
        _ => return err.into(),
    };

    if message.contains("raw_events.event_id")
        || message.contains("normalized_measurements.raw_event_id")
    {
        return Error::DuplicateIdentity(writes.raw_event.event_id);
    }

    if message.contains("normalized_measurements.device_id") {
        let new = &writes.measurement;
        return match position::locate(conn, &new.device_id, &new.metric_type, &new.timestamp) {
            Err(e) => e,
            Ok(_) => Error::Corrupt(format!(
                "unique violation without a stored measurement at {}",
                new.timestamp
            )),
        };
    }

    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConflictError;
    use crate::store::MeasurementStore;
    use chrono::TimeZone;
    use meterline_core::{EventIdentity, QualityFlag};

    fn conflict_for(new: &NewMeasurement, existing: Measurement) -> Error {
        ConflictError {
            device_id: new.device_id.clone(),
            metric_type: new.metric_type.clone(),
            timestamp: new.timestamp,
            existing,
        }
        .into()
    }

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    fn writes(hour: u32, value: f64) -> WriteSet {
        let event_id = EventIdentity::derive("m1", &ts(hour), "energy", value);
        WriteSet {
            raw_event: RawEvent {
                event_id,
                device_id: "m1".into(),
                building_id: "b1".into(),
                timestamp: ts(hour).to_rfc3339(),
                metric_type: "energy".into(),
                value,
                unit: "kWh".into(),
                raw_payload: serde_json::json!({"value": value}),
                received_at: ts(23),
            },
            measurement: NewMeasurement {
                device_id: "m1".into(),
                building_id: "b1".into(),
                metric_type: "energy".into(),
                timestamp: ts(hour),
                value,
                delta_value: None,
                quality_flags: QualityFlag::FirstReading.into(),
            },
            successor_update: None,
        }
    }

    #[test]
    fn test_apply_inserts_all_records() {
        let store = MeasurementStore::open_in_memory().unwrap();
        let w = writes(10, 2000.0);
        let stored = store.with_transaction(|tx| apply(tx, &w)).unwrap();

        assert_eq!(stored.value, 2000.0);
        assert_eq!(stored.unit, CANONICAL_UNIT);
        assert_eq!(stored.raw_event_id, w.raw_event.event_id);
        assert_eq!(store.latest("m1", "energy").unwrap(), Some(stored));
        assert_eq!(store.raw_event(&w.raw_event.event_id).unwrap(), Some(w.raw_event));
        assert_eq!(store.devices(Some("b1")).unwrap().len(), 1);
        assert_eq!(store.buildings().unwrap()[0].building.name, "b1");
    }

    #[test]
    fn test_apply_updates_successor() {
        let store = MeasurementStore::open_in_memory().unwrap();
        let later = store.with_transaction(|tx| apply(tx, &writes(12, 2050.0))).unwrap();

        let mut w = writes(11, 2025.0);
        w.successor_update = Some(SuccessorUpdate {
            id: later.id,
            delta_value: Some(25.0),
            quality_flags: QualityFlags::empty(),
        });
        store.with_transaction(|tx| apply(tx, &w)).unwrap();

        let updated = store.latest("m1", "energy").unwrap().unwrap();
        assert_eq!(updated.id, later.id);
        assert_eq!(updated.delta_value, Some(25.0));
        assert!(updated.quality_flags.is_empty());
    }

    #[test]
    fn test_duplicate_identity() {
        let store = MeasurementStore::open_in_memory().unwrap();
        let w = writes(10, 2000.0);
        store.with_transaction(|tx| apply(tx, &w)).unwrap();

        let err = store.with_transaction(|tx| apply(tx, &w)).unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity(id) if id == w.raw_event.event_id));
        assert_eq!(store.measurement_count().unwrap(), 1);
    }

    #[test]
    fn test_stream_collision_is_conflict() {
        let store = MeasurementStore::open_in_memory().unwrap();
        let first = store.with_transaction(|tx| apply(tx, &writes(10, 2000.0))).unwrap();

        // Same stream timestamp under a different identity
        let mut w = writes(10, 2000.0);
        w.raw_event.event_id = EventIdentity::from_bytes([9; 32]);
        let err = store.with_transaction(|tx| apply(tx, &w)).unwrap_err();

        let expected = conflict_for(&w.measurement, first);
        assert_eq!(err.to_string(), expected.to_string());
        assert!(store.raw_event(&w.raw_event.event_id).unwrap().is_none());
    }

    #[test]
    fn test_missing_successor_rolls_back() {
        let store = MeasurementStore::open_in_memory().unwrap();
        let mut w = writes(10, 2000.0);
        w.successor_update = Some(SuccessorUpdate {
            id: 42,
            delta_value: None,
            quality_flags: QualityFlags::empty(),
        });

        let err = store.with_transaction(|tx| apply(tx, &w)).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
        assert_eq!(store.measurement_count().unwrap(), 0);
        assert!(store.buildings().unwrap().is_empty());
    }

    #[test]
    fn test_device_keeps_first_building() {
        let store = MeasurementStore::open_in_memory().unwrap();
        store.with_transaction(|tx| apply(tx, &writes(10, 1.0))).unwrap();

        let mut w = writes(11, 2.0);
        w.raw_event.building_id = "b2".into();
        w.measurement.building_id = "b2".into();
        store.with_transaction(|tx| apply(tx, &w)).unwrap();

        let devices = store.devices(None).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].building_id, "b1");
        assert_eq!(store.buildings().unwrap().len(), 2);
    }
}
