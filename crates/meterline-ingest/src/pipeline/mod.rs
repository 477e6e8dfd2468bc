//! The ingestion pipeline.
//!
//! ```text
//! IngestRequest → validate → [dedupe] → normalize → [position] → delta engine → [persist]
//! ```
//!
//! - [`dedupe`] - Deduplication Guard: identity lookup in the raw event log
//! - [`position`] - Sequence Positioner: predecessor/successor lookup per stream
//! - [`persist`] - Persister: applies one closed write set atomically
//! - [`Ingestor`] - Orchestrator composing the stages in one transaction
//!
//! Validation, unit normalization and the delta engine are pure and live
//! in `meterline-core`.

pub mod dedupe;
mod orchestrator;
pub mod persist;
pub mod position;

pub use orchestrator::{IngestFailure, IngestOutcome, IngestStage, Ingestor};
pub use persist::{NewMeasurement, SuccessorUpdate, WriteSet};
pub use position::Neighbors;
