//! Meterline Serve - HTTP surface for the telemetry pipeline
//!
//! Accepts readings over HTTP, runs them through the ingest pipeline, and
//! exposes read queries over the normalized measurements.
//!
//! # Architecture
//!
//! - **AppState**: Shared application state (ingestor, configuration)
//! - **Routes**: Endpoint handlers for ingestion, queries, and health
//! - **ApiError**: Maps pipeline and storage errors to JSON responses

mod error;
mod routes;
mod state;

pub use self::error::ApiError;
pub use self::routes::router;
pub use self::state::{AppState, Config};
