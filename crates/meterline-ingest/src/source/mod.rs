//! Request source adapters.
//!
//! Sources feed ingest requests into the pipeline from outside the HTTP
//! surface, e.g. to backfill or replay recorded telemetry.
//!
//! - [`JsonlSource`] - Reads JSONL files (one ingest request per line)

mod jsonl;

pub use jsonl::{JsonlConfig, JsonlSource};

use meterline_core::IngestRequest;

use crate::Result;

/// A source of ingest requests.
pub trait RequestSource {
    /// Human-readable name for this source (used in logs).
    fn name(&self) -> &'static str;

    /// Feed every request from this source to `handler`.
    ///
    /// The handler returns `Ok(true)` to continue, `Ok(false)` to stop
    /// gracefully, or `Err` to abort.
    fn process<F>(&mut self, handler: F) -> Result<SourceStats>
    where
        F: FnMut(IngestRequest) -> Result<bool>;
}

/// Statistics from processing a request source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Non-blank lines encountered.
    pub total_requests: usize,

    /// Requests that parsed and were handed to the handler.
    pub parsed_requests: usize,

    /// Lines that could not be parsed as an ingest request.
    pub parse_errors: usize,

    /// Files fully or partially read.
    pub files_processed: usize,

    /// Total bytes of input files visited.
    pub bytes_read: usize,
}
