//! Ingest Orchestrator.
//!
//! Runs one request through the pipeline as a single unit of work:
//!
//! ```text
//! validating → deduplicating → normalizing_units → positioning → computing → persisting
//!      │              │                 │                 │                         │
//!   Rejected      Duplicate          Rejected          Conflict                  Created
//! ```
//!
//! Everything after validation happens inside one `IMMEDIATE` transaction,
//! so the neighbors read while positioning are still the neighbors when
//! the write commits. Any storage error aborts the transaction and is
//! reported as [`IngestOutcome::Failed`]; resubmitting is always safe
//! because the identity check makes the pipeline idempotent.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{SubsecRound, Utc};
use meterline_core::metrics::{increment, increment_labeled, record_duration};
use meterline_core::normalize::canonical_value;
use meterline_core::{
    DeltaRules, EventIdentity, IngestRequest, Measurement, Placement, QualityFlag, RawEvent,
};
use tracing::{debug, error, info, warn};

use super::persist::{self, NewMeasurement, SuccessorUpdate, WriteSet};
use super::{dedupe, position};
use crate::error::{ConflictError, StorageFailureKind};
use crate::store::MeasurementStore;
use crate::{Error, IngestConfig, Result};

/// Pipeline stage a request is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Validating,
    Deduplicating,
    NormalizingUnits,
    Positioning,
    Computing,
    Persisting,
}

impl IngestStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Deduplicating => "deduplicating",
            Self::NormalizingUnits => "normalizing_units",
            Self::Positioning => "positioning",
            Self::Computing => "computing",
            Self::Persisting => "persisting",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A storage failure, with the stage it interrupted.
#[derive(Debug)]
pub struct IngestFailure {
    pub stage: IngestStage,
    pub kind: StorageFailureKind,
    pub error: Error,
}

/// Terminal result of one ingest request.
#[derive(Debug)]
pub enum IngestOutcome {
    /// A new measurement was stored.
    Created(Measurement),
    /// The reading was already ingested; this is the stored measurement.
    Duplicate(Measurement),
    /// The reading is malformed or uses an unsupported unit.
    Rejected(meterline_core::Error),
    /// A different reading already occupies the timestamp.
    Conflict(Box<ConflictError>),
    /// Storage failed; the request may be retried.
    Failed(IngestFailure),
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Duplicate(_) => "duplicate",
            Self::Rejected(_) => "rejected",
            Self::Conflict(_) => "conflict",
            Self::Failed(_) => "failed",
        }
    }

    /// The stored measurement for created and duplicate outcomes.
    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            Self::Created(m) | Self::Duplicate(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// What a committed transaction produced.
enum Accepted {
    Created {
        measurement: Measurement,
        placement: Placement,
        successor_recomputed: bool,
    },
    Duplicate(Measurement),
}

/// Composes the pipeline stages over a shared [`MeasurementStore`].
///
/// Cheap to share: wrap in `Arc` and call [`Ingestor::ingest`] from any
/// number of threads.
pub struct Ingestor {
    store: Arc<MeasurementStore>,
    rules: DeltaRules,
}

impl Ingestor {
    pub fn new(store: Arc<MeasurementStore>, rules: DeltaRules) -> Self {
        Self { store, rules }
    }

    /// Open the store described by `config`.
    pub fn open(config: &IngestConfig) -> Result<Self> {
        let store = MeasurementStore::open(config)?;
        Ok(Self::new(Arc::new(store), config.delta_rules()))
    }

    pub fn store(&self) -> &Arc<MeasurementStore> {
        &self.store
    }

    pub fn rules(&self) -> DeltaRules {
        self.rules
    }

    /// Ingest one reading.
    ///
    /// Blocks on storage I/O; async callers should run it on a blocking
    /// thread.
    pub fn ingest(&self, request: &IngestRequest) -> IngestOutcome {
        let started = Instant::now();
        increment("ingest_events_total", 1);

        let outcome = self.run(request);

        record_duration("ingest_duration_seconds", started.elapsed());
        report(request, &outcome);
        outcome
    }

    fn run(&self, request: &IngestRequest) -> IngestOutcome {
        let mut stage = IngestStage::Validating;
        let validated = match request.validate() {
            Ok(validated) => validated,
            Err(e) => return IngestOutcome::Rejected(e),
        };
        let identity = validated.identity();
        let timestamp = validated.timestamp;
        advance(&mut stage, IngestStage::Deduplicating, &identity);

        let result = self.store.with_transaction(|tx| {
            if let Some(existing) = dedupe::find_existing(tx, &identity)? {
                return Ok(Accepted::Duplicate(existing));
            }

            advance(&mut stage, IngestStage::NormalizingUnits, &identity);
            let value = canonical_value(request.value, &request.unit)?;

            advance(&mut stage, IngestStage::Positioning, &identity);
            let neighbors =
                position::locate(tx, &request.device_id, &request.metric_type, &timestamp)?;

            advance(&mut stage, IngestStage::Computing, &identity);
            let assessment = self.rules.assess(
                value,
                neighbors.predecessor_value(),
                neighbors.successor_reading(),
            );
            let successor_update = neighbors
                .successor
                .as_ref()
                .zip(assessment.successor)
                .map(|(next, revision)| SuccessorUpdate {
                    id: next.id,
                    delta_value: revision.delta,
                    quality_flags: revision.flags,
                });
            debug!(
                identity = %identity,
                placement = assessment.placement.as_str(),
                delta = ?assessment.delta,
                flags = %assessment.flags,
                "Computed delta"
            );

            advance(&mut stage, IngestStage::Persisting, &identity);
            let received_at = Utc::now().trunc_subsecs(6);
            let writes = WriteSet {
                raw_event: RawEvent {
                    event_id: identity,
                    device_id: request.device_id.clone(),
                    building_id: request.building_id.clone(),
                    timestamp: request.timestamp.clone(),
                    metric_type: request.metric_type.clone(),
                    value: request.value,
                    unit: request.unit.clone(),
                    raw_payload: request.payload(),
                    received_at,
                },
                measurement: NewMeasurement {
                    device_id: request.device_id.clone(),
                    building_id: request.building_id.clone(),
                    metric_type: request.metric_type.clone(),
                    timestamp,
                    value,
                    delta_value: assessment.delta,
                    quality_flags: assessment.flags,
                },
                successor_update,
            };
            let measurement = persist::apply(tx, &writes)?;

            Ok(Accepted::Created {
                measurement,
                placement: assessment.placement,
                successor_recomputed: successor_update.is_some(),
            })
        });

        match result {
            Ok(Accepted::Created {
                measurement,
                placement,
                successor_recomputed,
            }) => {
                record_flags(&measurement, successor_recomputed);
                debug!(
                    identity = %identity,
                    placement = placement.as_str(),
                    successor_recomputed,
                    "Committed"
                );
                IngestOutcome::Created(measurement)
            }
            Ok(Accepted::Duplicate(existing)) => IngestOutcome::Duplicate(existing),
            Err(Error::Core(e)) => IngestOutcome::Rejected(e),
            Err(Error::Conflict(conflict)) => IngestOutcome::Conflict(conflict),
            Err(Error::DuplicateIdentity(id)) => self.resolve_duplicate(&id, stage),
            Err(error) => failed(stage, error),
        }
    }

    /// A concurrent request stored the same reading first; report its
    /// measurement as the duplicate.
    fn resolve_duplicate(&self, identity: &EventIdentity, stage: IngestStage) -> IngestOutcome {
        debug!(identity = %identity, "Identity race lost, resolving as duplicate");
        match self
            .store
            .with_transaction(|tx| dedupe::find_existing(tx, identity))
        {
            Ok(Some(existing)) => IngestOutcome::Duplicate(existing),
            Ok(None) => IngestOutcome::Failed(IngestFailure {
                stage,
                kind: StorageFailureKind::Contention,
                error: Error::DuplicateIdentity(*identity),
            }),
            Err(error) => failed(IngestStage::Deduplicating, error),
        }
    }
}

fn advance(stage: &mut IngestStage, next: IngestStage, identity: &EventIdentity) {
    debug!(identity = %identity, from = stage.as_str(), to = next.as_str(), "Stage");
    *stage = next;
}

fn failed(stage: IngestStage, error: Error) -> IngestOutcome {
    let kind = error
        .storage_failure()
        .unwrap_or(StorageFailureKind::Unavailable);
    IngestOutcome::Failed(IngestFailure { stage, kind, error })
}

fn record_flags(measurement: &Measurement, successor_recomputed: bool) {
    let flags = measurement.quality_flags;
    if flags.contains(QualityFlag::OutOfOrder) {
        increment("ingest_out_of_order_total", 1);
    }
    if flags.contains(QualityFlag::CounterReset) {
        increment("ingest_counter_resets_total", 1);
    }
    if flags.contains(QualityFlag::SuspiciousJump) {
        increment("ingest_suspicious_jumps_total", 1);
    }
    if successor_recomputed {
        increment("ingest_successor_recomputed_total", 1);
    }
}

fn report(request: &IngestRequest, outcome: &IngestOutcome) {
    match outcome {
        IngestOutcome::Created(m) => {
            increment("ingest_events_created_total", 1);
            info!(
                device_id = %m.device_id,
                metric_type = %m.metric_type,
                identity = %m.raw_event_id,
                flags = %m.quality_flags,
                "Measurement created"
            );
        }
        IngestOutcome::Duplicate(m) => {
            increment("ingest_events_duplicate_total", 1);
            info!(
                device_id = %m.device_id,
                identity = %m.raw_event_id,
                "Duplicate event, returning stored measurement"
            );
        }
        IngestOutcome::Rejected(e) => {
            let reason = match e {
                meterline_core::Error::UnsupportedUnit { .. } => "unsupported_unit",
                _ => "validation",
            };
            increment_labeled("ingest_events_rejected_total", "reason", reason);
            warn!(device_id = %request.device_id, "Rejected: {}", e);
        }
        IngestOutcome::Conflict(c) => {
            increment("ingest_events_conflict_total", 1);
            warn!(
                device_id = %c.device_id,
                metric_type = %c.metric_type,
                existing = %c.existing.raw_event_id,
                "Conflict: {}",
                c
            );
        }
        IngestOutcome::Failed(f) => {
            increment_labeled("ingest_events_failed_total", "kind", f.kind.as_str());
            error!(
                device_id = %request.device_id,
                stage = f.stage.as_str(),
                kind = f.kind.as_str(),
                "Ingest failed: {}",
                f.error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterline_core::QualityFlags;

    fn ingestor() -> Ingestor {
        let store = MeasurementStore::open_in_memory().unwrap();
        Ingestor::new(Arc::new(store), DeltaRules::default())
    }

    fn request(device: &str, timestamp: &str, value: f64, unit: &str) -> IngestRequest {
        IngestRequest {
            device_id: device.to_string(),
            building_id: "building-a".to_string(),
            timestamp: timestamp.to_string(),
            metric_type: "energy".to_string(),
            value,
            unit: unit.to_string(),
            extra: serde_json::Map::new(),
        }
    }

    fn at(hour: u32, value: f64) -> IngestRequest {
        request("meter-001", &format!("2026-01-01T{hour:02}:00:00Z"), value, "kWh")
    }

    fn created(outcome: IngestOutcome) -> Measurement {
        match outcome {
            IngestOutcome::Created(m) => m,
            other => panic!("expected created, got {other:?}"),
        }
    }

    fn series(ingestor: &Ingestor) -> Vec<Measurement> {
        let start = meterline_core::normalize::parse_timestamp("2026-01-01T00:00:00Z").unwrap();
        let end = meterline_core::normalize::parse_timestamp("2026-01-02T00:00:00Z").unwrap();
        let range = crate::store::TimeRange::new(start, end).unwrap();
        ingestor
            .store()
            .timeseries("meter-001", "energy", range)
            .unwrap()
    }

    // =========================================================================
    // Idempotence and duplicates
    // =========================================================================

    #[test]
    fn test_idempotence() {
        let ingestor = ingestor();
        let first = created(ingestor.ingest(&at(10, 1000.0)));
        let before = series(&ingestor);

        match ingestor.ingest(&at(10, 1000.0)) {
            IngestOutcome::Duplicate(m) => assert_eq!(m, first),
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(series(&ingestor), before);
        assert_eq!(ingestor.store().measurement_count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_with_different_offset() {
        let ingestor = ingestor();
        created(ingestor.ingest(&request(
            "meter-001",
            "2026-01-01T10:00:00Z",
            1000.0,
            "kWh",
        )));
        let outcome = ingestor.ingest(&request(
            "meter-001",
            "2026-01-01T12:00:00+02:00",
            1000.0,
            "kWh",
        ));
        assert_eq!(outcome.as_str(), "duplicate");
    }

    #[test]
    fn test_concurrent_identical_submissions() {
        let ingestor = ingestor();
        let outcomes: Vec<&'static str> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| ingestor.ingest(&at(10, 1000.0)).as_str()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|o| **o == "created").count(), 1);
        assert_eq!(outcomes.iter().filter(|o| **o == "duplicate").count(), 7);
        assert_eq!(ingestor.store().measurement_count().unwrap(), 1);
    }

    // =========================================================================
    // Deltas and flags
    // =========================================================================

    #[test]
    fn test_first_reading() {
        let ingestor = ingestor();
        let m = created(ingestor.ingest(&at(10, 1000.0)));
        assert_eq!(m.delta_value, None);
        assert_eq!(m.quality_flags, QualityFlags::from(QualityFlag::FirstReading));
    }

    #[test]
    fn test_monotonic_sequence() {
        let ingestor = ingestor();
        for (hour, value) in [(10, 1000.0), (11, 1012.5), (12, 1025.3)] {
            created(ingestor.ingest(&at(hour, value)));
        }

        let stored = series(&ingestor);
        let deltas: Vec<_> = stored.iter().map(|m| m.delta_value).collect();
        assert_eq!(deltas, vec![None, Some(12.5), Some(12.8)]);
        for m in &stored[1..] {
            assert!(m.quality_flags.is_empty());
        }
    }

    #[test]
    fn test_counter_reset() {
        let ingestor = ingestor();
        created(ingestor.ingest(&at(10, 9950.0)));
        let m = created(ingestor.ingest(&at(11, 50.0)));
        assert_eq!(m.delta_value, None);
        assert!(m.quality_flags.contains(QualityFlag::CounterReset));
        assert_eq!(m.value, 50.0);
    }

    #[test]
    fn test_suspicious_jump() {
        let ingestor = ingestor();
        created(ingestor.ingest(&at(10, 1000.0)));
        let m = created(ingestor.ingest(&at(11, 12_000.0)));
        assert_eq!(m.delta_value, Some(11_000.0));
        assert!(m.quality_flags.contains(QualityFlag::SuspiciousJump));
    }

    #[test]
    fn test_configured_jump_threshold() {
        let store = MeasurementStore::open_in_memory().unwrap();
        let ingestor = Ingestor::new(Arc::new(store), DeltaRules::new(100.0));
        created(ingestor.ingest(&at(10, 1000.0)));
        let m = created(ingestor.ingest(&at(11, 1200.0)));
        assert!(m.quality_flags.contains(QualityFlag::SuspiciousJump));
    }

    #[test]
    fn test_out_of_order_recomputation() {
        let ingestor = ingestor();
        let ten = created(ingestor.ingest(&at(10, 2000.0)));
        created(ingestor.ingest(&at(12, 2050.0)));
        let eleven = created(ingestor.ingest(&at(11, 2025.0)));

        assert_eq!(eleven.delta_value, Some(25.0));
        assert!(eleven.quality_flags.contains(QualityFlag::OutOfOrder));

        let stored = series(&ingestor);
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0], ten);
        assert_eq!(stored[1], eleven);
        assert_eq!(stored[2].delta_value, Some(25.0));
        assert!(stored[2].quality_flags.is_empty());
    }

    #[test]
    fn test_late_reading_before_first() {
        let ingestor = ingestor();
        created(ingestor.ingest(&at(12, 2050.0)));
        let early = created(ingestor.ingest(&at(10, 2000.0)));

        assert_eq!(early.delta_value, None);
        assert!(early.quality_flags.contains(QualityFlag::FirstReading));
        assert!(early.quality_flags.contains(QualityFlag::OutOfOrder));

        let later = ingestor.store().latest("meter-001", "energy").unwrap().unwrap();
        assert_eq!(later.delta_value, Some(50.0));
        assert!(!later.quality_flags.contains(QualityFlag::FirstReading));
    }

    #[test]
    fn test_consecutive_late_readings() {
        let ingestor = ingestor();
        created(ingestor.ingest(&at(10, 100.0)));
        created(ingestor.ingest(&at(13, 400.0)));
        created(ingestor.ingest(&at(12, 300.0)));
        created(ingestor.ingest(&at(11, 150.0)));

        let stored = series(&ingestor);
        let deltas: Vec<_> = stored.iter().map(|m| m.delta_value).collect();
        assert_eq!(deltas, vec![None, Some(50.0), Some(150.0), Some(100.0)]);

        // The 12:00 reading keeps its own out-of-order flag after recomputation
        assert!(stored[2].quality_flags.contains(QualityFlag::OutOfOrder));
        assert!(!stored[3].quality_flags.contains(QualityFlag::OutOfOrder));
    }

    // =========================================================================
    // Units, rejection and conflict
    // =========================================================================

    #[test]
    fn test_unit_conversion() {
        let ingestor = ingestor();
        let wh = created(ingestor.ingest(&request(
            "meter-wh",
            "2026-01-01T10:00:00Z",
            5000.0,
            "Wh",
        )));
        let mwh = created(ingestor.ingest(&request(
            "meter-mwh",
            "2026-01-01T10:00:00Z",
            2.5,
            "MWh",
        )));
        assert_eq!(wh.value, 5.0);
        assert_eq!(wh.unit, "kWh");
        assert_eq!(mwh.value, 2500.0);

        // The audit log keeps the original value and unit
        let raw = ingestor.store().raw_event(&wh.raw_event_id).unwrap().unwrap();
        assert_eq!(raw.value, 5000.0);
        assert_eq!(raw.unit, "Wh");
    }

    #[test]
    fn test_delta_across_units() {
        let ingestor = ingestor();
        created(ingestor.ingest(&request("meter-001", "2026-01-01T10:00:00Z", 1.0, "MWh")));
        let m = created(ingestor.ingest(&request(
            "meter-001",
            "2026-01-01T11:00:00Z",
            1_012_500.0,
            "Wh",
        )));
        assert_eq!(m.delta_value, Some(12.5));
    }

    #[test]
    fn test_unsupported_unit_rejected() {
        let ingestor = ingestor();
        let outcome = ingestor.ingest(&request("meter-001", "2026-01-01T10:00:00Z", 1.0, "BTU"));
        assert!(matches!(
            outcome,
            IngestOutcome::Rejected(meterline_core::Error::UnsupportedUnit { .. })
        ));
        assert_eq!(ingestor.store().measurement_count().unwrap(), 0);
        assert!(ingestor.store().buildings().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let ingestor = ingestor();
        let outcome = ingestor.ingest(&request("meter-001", "2026-01-01T10:00:00", 1.0, "kWh"));
        assert!(matches!(
            outcome,
            IngestOutcome::Rejected(meterline_core::Error::Validation { field: "timestamp", .. })
        ));
        assert!(!outcome.is_retryable());
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let ingestor = ingestor();
        let outcome = ingestor.ingest(&at(10, f64::INFINITY));
        assert_eq!(outcome.as_str(), "rejected");
    }

    #[test]
    fn test_conversion_overflow_rejected() {
        let ingestor = ingestor();
        let req = request("meter-001", "2026-01-01T10:00:00Z", 1e306, "MWh");
        let outcome = ingestor.ingest(&req);
        assert!(matches!(
            outcome,
            IngestOutcome::Rejected(meterline_core::Error::Validation { field: "value", .. })
        ));
        assert_eq!(ingestor.store().measurement_count().unwrap(), 0);
        let identity = req.validate().unwrap().identity();
        assert!(ingestor.store().raw_event(&identity).unwrap().is_none());
    }

    #[test]
    fn test_large_finite_value_created() {
        let ingestor = ingestor();
        let m = created(ingestor.ingest(&request("meter-001", "2026-01-01T10:00:00Z", 1e303, "kWh")));
        assert_eq!(m.value, 1e303);
        assert!(m.value.is_finite());
    }

    #[test]
    fn test_conflict() {
        let ingestor = ingestor();
        let original = created(ingestor.ingest(&at(10, 1000.0)));

        match ingestor.ingest(&at(10, 1001.0)) {
            IngestOutcome::Conflict(c) => assert_eq!(c.existing, original),
            other => panic!("expected conflict, got {other:?}"),
        }

        let stored = series(&ingestor);
        assert_eq!(stored, vec![original]);
    }

    #[test]
    fn test_conflict_across_units_with_equal_value() {
        // Same canonical quantity, different identity
        let ingestor = ingestor();
        created(ingestor.ingest(&at(10, 1.0)));
        let outcome =
            ingestor.ingest(&request("meter-001", "2026-01-01T10:00:00Z", 1000.0, "Wh"));
        assert_eq!(outcome.as_str(), "conflict");
    }

    // =========================================================================
    // Metadata, audit and failures
    // =========================================================================

    #[test]
    fn test_registers_metadata() {
        let ingestor = ingestor();
        created(ingestor.ingest(&at(10, 1.0)));
        created(ingestor.ingest(&request("meter-002", "2026-01-01T10:00:00Z", 1.0, "kWh")));

        let buildings = ingestor.store().buildings().unwrap();
        assert_eq!(buildings.len(), 1);
        assert_eq!(buildings[0].device_count, 2);
        assert_eq!(ingestor.store().devices(Some("building-a")).unwrap().len(), 2);
    }

    #[test]
    fn test_raw_payload_preserved() {
        let ingestor = ingestor();
        let mut req = at(10, 1.0);
        req.extra
            .insert("firmware".to_string(), serde_json::json!("2.1.0"));
        let m = created(ingestor.ingest(&req));

        let raw = ingestor.store().raw_event(&m.raw_event_id).unwrap().unwrap();
        assert_eq!(raw.raw_payload["firmware"], "2.1.0");
        assert_eq!(raw.timestamp, "2026-01-01T10:00:00Z");
    }

    #[test]
    fn test_storage_failure_is_retryable() {
        let ingestor = ingestor();
        ingestor
            .store()
            .with_transaction(|tx| {
                tx.execute_batch("DROP TABLE normalized_measurements")?;
                Ok(())
            })
            .unwrap();

        match ingestor.ingest(&at(10, 1.0)) {
            IngestOutcome::Failed(f) => {
                assert_eq!(f.kind, StorageFailureKind::Unavailable);
                assert_eq!(f.stage, IngestStage::Positioning);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(ingestor.store().raw_event(&at(10, 1.0).validate().unwrap().identity()).unwrap().is_none());
    }

    #[test]
    fn test_parallel_streams() {
        let ingestor = ingestor();
        std::thread::scope(|s| {
            for device in ["m-a", "m-b", "m-c", "m-d"] {
                let ingestor = &ingestor;
                s.spawn(move || {
                    for hour in 0..12u32 {
                        let ts = format!("2026-01-01T{hour:02}:00:00Z");
                        let outcome = ingestor.ingest(&request(device, &ts, f64::from(hour) * 10.0, "kWh"));
                        assert_eq!(outcome.as_str(), "created");
                    }
                });
            }
        });

        for device in ["m-a", "m-b", "m-c", "m-d"] {
            let latest = ingestor.store().latest(device, "energy").unwrap().unwrap();
            assert_eq!(latest.delta_value, Some(10.0));
        }
        assert_eq!(ingestor.store().measurement_count().unwrap(), 48);
    }
}
