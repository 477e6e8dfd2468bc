//! SQLite-backed measurement store.
//!
//! The [`MeasurementStore`] owns the single connection. Writers go through
//! [`MeasurementStore::with_transaction`], which holds the connection lock
//! and an `IMMEDIATE` SQLite transaction for the whole unit of work, so the
//! positioning read and the final write of one request always see the same
//! snapshot of every stream.

mod query;
pub mod schema;

use chrono::{DateTime, Utc};
use meterline_core::{EventIdentity, Measurement, QualityFlags, RawEvent};
use parking_lot::Mutex;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};
use tracing::info;

use crate::{Error, IngestConfig, Result};

pub use query::TimeRange;

/// Column list matching [`MeasurementRow::from_row`].
pub(crate) const MEASUREMENT_COLUMNS: &str = "id, raw_event_id, device_id, building_id, \
     metric_type, ts, value, unit, delta_value, quality_flags, created_at";

/// Column list matching [`RawEventRow::from_row`].
pub(crate) const RAW_EVENT_COLUMNS: &str = "event_id, device_id, building_id, timestamp, \
     metric_type, value, unit, raw_payload, received_at";

/// Thread-safe handle to the measurement database.
///
/// Share across threads via `Arc<MeasurementStore>`.
pub struct MeasurementStore {
    conn: Mutex<Connection>,
}

impl MeasurementStore {
    /// Open or create the store at `config.db_path`.
    pub fn open(config: &IngestConfig) -> Result<Self> {
        let path = config.db_path.as_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening measurement store at {}", path.display());

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(config.busy_timeout)?;
        Self::init(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` inside an `IMMEDIATE` transaction.
    ///
    /// Commits when `f` returns `Ok`; any error rolls the whole unit of
    /// work back, so partial writes are never visible.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run a read-only closure against committed state.
    pub(crate) fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Check that the database answers queries.
    pub fn ping(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}

// =============================================================================
// Row decoding
// =============================================================================

/// A `normalized_measurements` row as stored.
pub(crate) struct MeasurementRow {
    id: i64,
    raw_event_id: String,
    device_id: String,
    building_id: String,
    metric_type: String,
    ts: i64,
    value: f64,
    unit: String,
    delta_value: Option<f64>,
    quality_flags: i64,
    created_at: i64,
}

impl MeasurementRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            raw_event_id: row.get(1)?,
            device_id: row.get(2)?,
            building_id: row.get(3)?,
            metric_type: row.get(4)?,
            ts: row.get(5)?,
            value: row.get(6)?,
            unit: row.get(7)?,
            delta_value: row.get(8)?,
            quality_flags: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    pub(crate) fn decode(self) -> Result<Measurement> {
        let quality_flags = u8::try_from(self.quality_flags)
            .ok()
            .and_then(QualityFlags::from_bits)
            .ok_or_else(|| {
                Error::Corrupt(format!(
                    "measurement {} has unknown quality flag bits {:#x}",
                    self.id, self.quality_flags
                ))
            })?;

        Ok(Measurement {
            id: self.id,
            raw_event_id: decode_identity(&self.raw_event_id)?,
            device_id: self.device_id,
            building_id: self.building_id,
            metric_type: self.metric_type,
            timestamp: from_micros(self.ts)?,
            value: self.value,
            unit: self.unit,
            delta_value: self.delta_value,
            quality_flags,
            created_at: from_micros(self.created_at)?,
        })
    }
}

/// A `raw_events` row as stored.
pub(crate) struct RawEventRow {
    event_id: String,
    device_id: String,
    building_id: String,
    timestamp: String,
    metric_type: String,
    value: f64,
    unit: String,
    raw_payload: String,
    received_at: i64,
}

impl RawEventRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            event_id: row.get(0)?,
            device_id: row.get(1)?,
            building_id: row.get(2)?,
            timestamp: row.get(3)?,
            metric_type: row.get(4)?,
            value: row.get(5)?,
            unit: row.get(6)?,
            raw_payload: row.get(7)?,
            received_at: row.get(8)?,
        })
    }

    pub(crate) fn decode(self) -> Result<RawEvent> {
        let raw_payload = serde_json::from_str(&self.raw_payload).map_err(|e| {
            Error::Corrupt(format!("raw event {} payload: {}", self.event_id, e))
        })?;

        Ok(RawEvent {
            event_id: decode_identity(&self.event_id)?,
            device_id: self.device_id,
            building_id: self.building_id,
            timestamp: self.timestamp,
            metric_type: self.metric_type,
            value: self.value,
            unit: self.unit,
            raw_payload,
            received_at: from_micros(self.received_at)?,
        })
    }
}

fn decode_identity(hex: &str) -> Result<EventIdentity> {
    hex.parse()
        .map_err(|_| Error::Corrupt(format!("invalid event identity '{hex}'")))
}

/// Storage representation of a timestamp.
pub(crate) fn to_micros(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| Error::Corrupt(format!("timestamp {micros} is out of range")))
}

/// Open a store in a temporary directory (for tests that need a file).
#[cfg(test)]
pub(crate) fn open_temp(dir: &std::path::Path) -> MeasurementStore {
    let config = IngestConfig {
        db_path: dir.join("meterline.db"),
        ..Default::default()
    };
    MeasurementStore::open(&config).unwrap()
}
