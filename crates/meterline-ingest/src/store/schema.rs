//! SQLite schema for the measurement store.
//!
//! Timestamps are stored as INTEGER microseconds since the Unix epoch,
//! which is the resolution the normalizer truncates to. Event identities
//! are stored as lowercase hex.

use rusqlite::{Connection, Result};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
///
/// Creates all tables if they don't exist and runs any pending migrations.
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        migrate(conn, current_version, SCHEMA_VERSION)?;
    }

    Ok(())
}

/// Get the current schema version (0 if not initialized).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS buildings (
            building_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            address TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS devices (
            device_id TEXT PRIMARY KEY,
            building_id TEXT NOT NULL REFERENCES buildings(building_id),
            name TEXT,
            location TEXT,
            device_type TEXT,
            created_at INTEGER NOT NULL
        );

        -- Append-only audit log, keyed by identity digest
        CREATE TABLE IF NOT EXISTS raw_events (
            event_id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            building_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            metric_type TEXT NOT NULL,
            value REAL NOT NULL,
            unit TEXT NOT NULL,
            raw_payload TEXT NOT NULL,
            received_at INTEGER NOT NULL
        );

        -- One row per (device_id, metric_type, ts). The unique index also
        -- serves ordered range scans over a stream.
        CREATE TABLE IF NOT EXISTS normalized_measurements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_event_id TEXT NOT NULL UNIQUE REFERENCES raw_events(event_id),
            device_id TEXT NOT NULL,
            building_id TEXT NOT NULL,
            metric_type TEXT NOT NULL,
            ts INTEGER NOT NULL,
            value REAL NOT NULL,
            unit TEXT NOT NULL,
            delta_value REAL,
            quality_flags INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            UNIQUE (device_id, metric_type, ts)
        );

        CREATE INDEX IF NOT EXISTS idx_devices_building ON devices(building_id);
        CREATE INDEX IF NOT EXISTS idx_measurements_building_ts
            ON normalized_measurements(building_id, ts);
        "#,
    )?;

    Ok(())
}

/// Run migrations from one version to another.
fn migrate(conn: &Connection, _from: i32, to: i32) -> Result<()> {
    // Version 1 is the first released layout; later versions add steps here.
    create_tables(conn)?;
    set_schema_version(conn, to)?;
    Ok(())
}
