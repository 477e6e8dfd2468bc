//! Core types, normalization, and shared utilities for the Meterline telemetry pipeline.
//!
//! This crate provides:
//! - Ingest request validation and the unit/timestamp normalizer
//! - Deterministic event identity digests for deduplication
//! - Quality flags and the delta & flag engine
//! - Measurement, raw event, and metadata model types
//! - Prometheus metrics helpers
//! - Shared error types
//!
//! Nothing in this crate touches storage. Components that need stored
//! neighbours receive them as plain values from the caller.

pub mod delta;
mod error;
mod flags;
mod identity;
pub mod metrics;
mod model;
pub mod normalize;
mod request;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// The single unit every canonical value and delta is expressed in.
pub const CANONICAL_UNIT: &str = "kWh";

/// Deltas above this many canonical units are flagged as suspicious jumps.
pub const DEFAULT_SUSPICIOUS_JUMP_KWH: f64 = 10_000.0;

/// Maximum length of device and building identifiers.
pub const MAX_ID_LEN: usize = 100;

pub use delta::{Assessment, DeltaOutcome, DeltaRules, Placement, Reading, SuccessorRevision};
pub use error::{Error, Result};
pub use flags::{QualityFlag, QualityFlags};
pub use identity::EventIdentity;
pub use model::{Building, BuildingSummary, Device, Measurement, RawEvent};
pub use normalize::Unit;
pub use request::{IngestRequest, ValidatedRequest};
