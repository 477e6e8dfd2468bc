//! Prometheus metrics helpers for the Meterline pipeline.
//!
//! Binaries install the recorder once at startup and optionally serve
//! `/metrics`; library code records through the `metrics` facade and is
//! a no-op when no recorder is installed.
//!
//! ```rust,ignore
//! use meterline_core::metrics::{init_metrics, start_metrics_server};
//!
//! let handle = init_metrics()?;
//! start_metrics_server(9091, handle).await?;
//! ```
//!
//! Metric names are prefixed with the component (`ingest_`) and suffixed
//! with the unit or type (`_total`, `_seconds`).

use std::net::SocketAddr;
use std::time::Duration;

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and describe all metrics.
///
/// Fails if a recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_common_metrics();
    Ok(handle)
}

/// Like [`init_metrics`] but returns `None` when a recorder is already
/// installed. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    init_metrics().ok()
}

/// Serve `/metrics` on `0.0.0.0:port` from a background task.
///
/// The listener is bound before returning, so a port clash is reported
/// to the caller.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<SocketAddr, std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    let addr = listener.local_addr()?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(addr)
}

fn register_common_metrics() {
    // =========================================================================
    // Ingest outcomes
    // =========================================================================

    describe_counter!("ingest_events_total", "Ingest requests received");
    describe_counter!(
        "ingest_events_created_total",
        "Requests that created a normalized measurement"
    );
    describe_counter!(
        "ingest_events_duplicate_total",
        "Requests recognized as retransmissions of a stored event"
    );
    describe_counter!(
        "ingest_events_rejected_total",
        "Requests rejected by validation or unit conversion (label: reason)"
    );
    describe_counter!(
        "ingest_events_conflict_total",
        "Requests whose timestamp already holds a different reading"
    );
    describe_counter!(
        "ingest_events_failed_total",
        "Requests that failed on storage and may be retried (label: kind)"
    );

    // =========================================================================
    // Quality flags
    // =========================================================================

    describe_counter!(
        "ingest_out_of_order_total",
        "Readings inserted before an already-normalized later reading"
    );
    describe_counter!(
        "ingest_counter_resets_total",
        "Readings whose value dropped below their predecessor"
    );
    describe_counter!(
        "ingest_suspicious_jumps_total",
        "Readings whose delta exceeded the jump threshold"
    );
    describe_counter!(
        "ingest_successor_recomputed_total",
        "Stored successors whose delta was recomputed after a late reading"
    );

    // =========================================================================
    // Timing
    // =========================================================================

    describe_histogram!(
        "ingest_duration_seconds",
        "Wall time of one ingest request, validation through commit"
    );
    describe_gauge!(
        "ingest_events_per_second",
        "Current replay rate (events/sec)"
    );
}

// =============================================================================
// Metric Recording Helpers
// =============================================================================

/// Increment a counter.
#[inline]
pub fn increment(name: &'static str, count: u64) {
    metrics::counter!(name).increment(count);
}

/// Increment a counter carrying a single `label`.
#[inline]
pub fn increment_labeled(name: &'static str, label: &'static str, value: &'static str) {
    metrics::counter!(name, label => value).increment(1);
}

/// Set a gauge value.
#[inline]
pub fn set_gauge(name: &'static str, value: f64) {
    metrics::gauge!(name).set(value);
}

/// Record an elapsed duration into a histogram, in seconds.
#[inline]
pub fn record_duration(name: &'static str, elapsed: Duration) {
    metrics::histogram!(name).record(elapsed.as_secs_f64());
}
