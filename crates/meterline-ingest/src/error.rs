//! Error types for the ingestion pipeline.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use meterline_core::{EventIdentity, Measurement};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum Error {
    /// Validation or normalization failure from the core crate.
    #[error(transparent)]
    Core(#[from] meterline_core::Error),

    /// A different reading is already stored at the same timestamp.
    #[error("{0}")]
    Conflict(Box<ConflictError>),

    /// The raw event identity was inserted by a concurrent request.
    #[error("event {0} is already stored")]
    DuplicateIdentity(EventIdentity),

    /// SQLite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored row could not be decoded.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// How a storage failure should be reported to the caller.
///
/// Both kinds are retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFailureKind {
    /// Another writer held the database lock.
    Contention,
    /// The store could not be read or written.
    Unavailable,
}

impl StorageFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contention => "contention",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for StorageFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify storage errors. Returns `None` for errors that describe
    /// the reading rather than the store.
    pub fn storage_failure(&self) -> Option<StorageFailureKind> {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                Some(StorageFailureKind::Contention)
            }
            Self::Database(_) | Self::Io(_) | Self::Serialization(_) | Self::Corrupt(_) => {
                Some(StorageFailureKind::Unavailable)
            }
            Self::Core(_) | Self::Conflict(_) | Self::DuplicateIdentity(_) => None,
        }
    }
}

/// A reading collided with a stored measurement at the same
/// `(device_id, metric_type, timestamp)` but with a different identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictError {
    pub device_id: String,
    pub metric_type: String,
    pub timestamp: DateTime<Utc>,
    /// The measurement already stored at that timestamp.
    pub existing: Measurement,
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a different {} reading for device '{}' is already stored at {} (value {} {})",
            self.metric_type,
            self.device_id,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.existing.value,
            self.existing.unit,
        )
    }
}

impl From<ConflictError> for Error {
    fn from(e: ConflictError) -> Self {
        Self::Conflict(Box::new(e))
    }
}
