//! Delta & Flag Engine.
//!
//! Pure computation over canonical values: given a new reading and its
//! neighbors in the stream, decide the reading's delta and quality
//! flags, and when the reading lands before an already-stored one,
//! the revised delta and flags of that immediate successor.
//!
//! Nothing here touches storage. The ingest pipeline reads the
//! neighbors inside its transaction and hands the resulting
//! [`Assessment`] to the persister.

use crate::normalize::round_value;
use crate::{DEFAULT_SUSPICIOUS_JUMP_KWH, QualityFlag, QualityFlags};

/// Thresholds applied when computing deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaRules {
    /// Deltas strictly above this (in kWh) are flagged `suspicious_jump`.
    pub suspicious_jump_threshold: f64,
}

impl Default for DeltaRules {
    fn default() -> Self {
        Self {
            suspicious_jump_threshold: DEFAULT_SUSPICIOUS_JUMP_KWH,
        }
    }
}

/// Where a new reading lands in its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The stream is empty.
    First,
    /// No later reading exists; the common case.
    Append,
    /// At least one later reading was already normalized.
    OutOfOrder,
}

impl Placement {
    pub fn classify(has_predecessor: bool, has_successor: bool) -> Self {
        match (has_predecessor, has_successor) {
            (_, true) => Self::OutOfOrder,
            (false, false) => Self::First,
            (true, false) => Self::Append,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Append => "append",
            Self::OutOfOrder => "out_of_order",
        }
    }
}

/// Result of comparing a value against its predecessor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeltaOutcome {
    /// No predecessor exists.
    FirstReading,
    /// The value dropped; consumption across the reset is unknown.
    CounterReset,
    /// Non-negative consumption since the predecessor.
    Consumption { delta: f64, suspicious: bool },
}

impl DeltaOutcome {
    pub fn delta(&self) -> Option<f64> {
        match self {
            Self::Consumption { delta, .. } => Some(*delta),
            Self::FirstReading | Self::CounterReset => None,
        }
    }

    /// Flags implied by this outcome alone.
    pub fn flags(&self) -> QualityFlags {
        match self {
            Self::FirstReading => QualityFlag::FirstReading.into(),
            Self::CounterReset => QualityFlag::CounterReset.into(),
            Self::Consumption {
                suspicious: true, ..
            } => QualityFlag::SuspiciousJump.into(),
            Self::Consumption { .. } => QualityFlags::empty(),
        }
    }
}

/// A stored neighbor, as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Canonical value.
    pub value: f64,
    pub flags: QualityFlags,
}

/// New delta and flags for the successor of an out-of-order reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuccessorRevision {
    pub delta: Option<f64>,
    pub flags: QualityFlags,
}

/// Everything the persister needs to know about a new reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub placement: Placement,
    pub delta: Option<f64>,
    pub flags: QualityFlags,
    /// Set only for [`Placement::OutOfOrder`].
    pub successor: Option<SuccessorRevision>,
}

/// Flags owned by the delta computation. Recomputing a delta replaces
/// exactly these; anything else on a stored reading is left alone.
const DELTA_FLAGS: [QualityFlag; 3] = [
    QualityFlag::FirstReading,
    QualityFlag::CounterReset,
    QualityFlag::SuspiciousJump,
];

impl DeltaRules {
    pub fn new(suspicious_jump_threshold: f64) -> Self {
        Self {
            suspicious_jump_threshold,
        }
    }

    /// Compare a canonical value with its predecessor's.
    ///
    /// A negative difference is a counter reset regardless of size; it is
    /// recorded, never estimated.
    pub fn compute(&self, current: f64, previous: Option<f64>) -> DeltaOutcome {
        let Some(previous) = previous else {
            return DeltaOutcome::FirstReading;
        };

        let delta = round_value(current - previous);
        if delta < 0.0 {
            DeltaOutcome::CounterReset
        } else {
            DeltaOutcome::Consumption {
                delta,
                suspicious: delta > self.suspicious_jump_threshold,
            }
        }
    }

    /// Assess a new reading with canonical `value` given its neighbors.
    pub fn assess(
        &self,
        value: f64,
        predecessor: Option<f64>,
        successor: Option<Reading>,
    ) -> Assessment {
        let placement = Placement::classify(predecessor.is_some(), successor.is_some());
        let outcome = self.compute(value, predecessor);

        let mut flags = outcome.flags();
        if placement == Placement::OutOfOrder {
            flags.insert(QualityFlag::OutOfOrder);
        }

        Assessment {
            placement,
            delta: outcome.delta(),
            flags,
            successor: successor.map(|next| self.revise_successor(value, next)),
        }
    }

    /// Recompute a successor's delta against its new immediate predecessor.
    fn revise_successor(&self, predecessor: f64, successor: Reading) -> SuccessorRevision {
        let outcome = self.compute(successor.value, Some(predecessor));

        let mut flags = successor.flags;
        for flag in DELTA_FLAGS {
            flags.remove(flag);
        }
        for flag in outcome.flags().iter() {
            flags.insert(flag);
        }

        SuccessorRevision {
            delta: outcome.delta(),
            flags,
        }
    }
}
