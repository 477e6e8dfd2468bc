//! Meterline ingestion pipeline.
//!
//! Turns validated telemetry readings into a clean, queryable measurement
//! stream while archiving every accepted payload for audit.
//!
//! # Modules
//!
//! - [`store`] - SQLite measurement store, transactions and read queries
//! - [`pipeline`] - Deduplication, positioning, persistence and the orchestrator
//! - [`source`] - Request source adapters (JSONL replay)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ IngestRequest   │  (HTTP, JSONL replay)
//! └────────┬────────┘
//!          │  validate, identity digest
//!          ▼
//! ┌─────────────────┐
//! │    Ingestor     │  one IMMEDIATE transaction per request
//! └────────┬────────┘
//!          │  dedupe → normalize → position → delta engine → persist
//!          ▼
//! ┌─────────────────┐
//! │MeasurementStore │  raw_events, normalized_measurements, devices, buildings
//! └─────────────────┘
//! ```
//!
//! Raw events are append-only. A stored measurement only ever changes when
//! a late reading becomes its new immediate predecessor.

mod config;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod store;

pub use config::IngestConfig;
pub use error::{ConflictError, Error, Result, StorageFailureKind};
pub use pipeline::{IngestFailure, IngestOutcome, IngestStage, Ingestor};
pub use store::{MeasurementStore, TimeRange};
