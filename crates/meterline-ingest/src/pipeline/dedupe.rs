//! Deduplication Guard.
//!
//! A reading is a retransmission when a raw event with the same identity
//! digest is already archived. The lookup runs inside the ingest
//! transaction; the primary key on `raw_events.event_id` closes the race
//! with a concurrent submission of the same reading.

use meterline_core::{EventIdentity, Measurement};
use rusqlite::{Connection, OptionalExtension};

use crate::store::{MEASUREMENT_COLUMNS, MeasurementRow};
use crate::{Error, Result};

/// Whether a raw event with this identity is archived.
pub fn is_known(conn: &Connection, identity: &EventIdentity) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM raw_events WHERE event_id = ?",
            [identity.to_hex()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// The measurement produced by an earlier submission of this reading.
///
/// Returns `None` for a reading that has never been accepted.
pub fn find_existing(conn: &Connection, identity: &EventIdentity) -> Result<Option<Measurement>> {
    if !is_known(conn, identity)? {
        return Ok(None);
    }

    let sql = format!(
        "SELECT {MEASUREMENT_COLUMNS} FROM normalized_measurements WHERE raw_event_id = ?"
    );
    let row = conn
        .query_row(&sql, [identity.to_hex()], MeasurementRow::from_row)
        .optional()?;

    match row {
        Some(row) => row.decode().map(Some),
        // Raw events and measurements are committed together
        None => Err(Error::Corrupt(format!(
            "raw event {identity} has no normalized measurement"
        ))),
    }
}
