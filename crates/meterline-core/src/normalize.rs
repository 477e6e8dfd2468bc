//! Unit and timestamp normalization.
//!
//! Every reading is canonicalized before it is compared with anything
//! already stored: energy values are converted to [`CANONICAL_UNIT`]
//! (kWh) and rounded to micro-kWh, timestamps are converted to UTC and
//! truncated to microseconds. Both are the resolution of the measurement
//! store, so a value is never compared at a precision it cannot be
//! persisted at.
//!
//! [`CANONICAL_UNIT`]: crate::CANONICAL_UNIT

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Error, Result};

/// Decimal places kept for canonical values and deltas.
pub const VALUE_SCALE: i32 = 6;

/// Energy units accepted on ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Watt-hours.
    Wh,
    /// Kilowatt-hours (canonical).
    KWh,
    /// Megawatt-hours.
    MWh,
}

impl Unit {
    /// Units listed in rejection messages.
    pub const SUPPORTED: &'static str = "Wh, kWh, MWh";

    /// Factor that converts a value in this unit to kWh.
    pub fn to_canonical_factor(self) -> f64 {
        match self {
            Self::Wh => 0.001,
            Self::KWh => 1.0,
            Self::MWh => 1000.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wh => "Wh",
            Self::KWh => "kWh",
            Self::MWh => "MWh",
        }
    }

    /// Convert a finite value in this unit to a rounded canonical value.
    pub fn to_canonical(self, value: f64) -> f64 {
        round_value(value * self.to_canonical_factor())
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Wh" => Ok(Self::Wh),
            "kWh" => Ok(Self::KWh),
            "MWh" => Ok(Self::MWh),
            other => Err(Error::UnsupportedUnit {
                unit: other.to_string(),
                supported: Self::SUPPORTED,
            }),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonicalize a value expressed in `unit`.
///
/// Fails with [`Error::Validation`] for values that are not finite before
/// or after conversion, and with [`Error::UnsupportedUnit`] for units
/// without a conversion.
pub fn canonical_value(value: f64, unit: &str) -> Result<f64> {
    check_finite(value)?;
    let unit: Unit = unit.parse()?;
    let canonical = unit.to_canonical(value);
    if !canonical.is_finite() {
        return Err(Error::validation(
            "value",
            format!("{value} {unit} overflows when converted to kWh"),
        ));
    }
    Ok(canonical)
}

/// Reject NaN and both infinities.
pub fn check_finite(value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::validation(
            "value",
            format!("{value} is not a finite number"),
        ))
    }
}

/// Parse an RFC 3339 timestamp and normalize it to UTC.
///
/// The offset is mandatory: a naive timestamp is ambiguous and is
/// rejected rather than assumed to be UTC. Sub-microsecond precision is
/// dropped.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    let parsed = match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt,
        Err(e) => {
            let reason = if NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").is_ok() {
                format!("'{raw}' has no timezone offset (append 'Z' or '+00:00')")
            } else {
                format!("'{raw}' is not an RFC 3339 timestamp: {e}")
            };
            return Err(Error::validation("timestamp", reason));
        }
    };

    let micros = parsed.with_timezone(&Utc).timestamp_micros();
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| Error::validation("timestamp", format!("'{raw}' is out of range")))
}

/// Round a canonical value or delta to [`VALUE_SCALE`] decimal places.
///
/// Values too large to scale have no fractional digits left and are
/// returned unchanged.
pub fn round_value(value: f64) -> f64 {
    let scale = 10f64.powi(VALUE_SCALE);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    // =========================================================================
    // Unit conversion
    // =========================================================================

    #[test]
    fn test_wh_to_kwh() {
        assert_eq!(canonical_value(5000.0, "Wh").unwrap(), 5.0);
    }

    #[test]
    fn test_mwh_to_kwh() {
        assert_eq!(canonical_value(2.5, "MWh").unwrap(), 2500.0);
    }

    #[test]
    fn test_kwh_is_identity() {
        assert_eq!(canonical_value(1234.56, "kWh").unwrap(), 1234.56);
    }

    #[test]
    fn test_unit_names_are_case_sensitive() {
        let err = canonical_value(1.0, "kwh").unwrap_err();
        assert!(matches!(err, Error::UnsupportedUnit { ref unit, .. } if unit == "kwh"));
    }

    #[test]
    fn test_unknown_unit() {
        let err = canonical_value(1.0, "BTU").unwrap_err();
        assert!(matches!(err, Error::UnsupportedUnit { .. }));
        assert!(err.to_string().contains("Wh, kWh, MWh"));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = canonical_value(value, "kWh").unwrap_err();
            assert!(matches!(err, Error::Validation { field: "value", .. }));
        }
    }

    #[test]
    fn test_non_finite_checked_before_unit() {
        let err = canonical_value(f64::NAN, "BTU").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_large_finite_value_stays_finite() {
        assert_eq!(canonical_value(1e303, "kWh").unwrap(), 1e303);
        assert_eq!(canonical_value(-1e303, "kWh").unwrap(), -1e303);
    }

    #[test]
    fn test_conversion_overflow_rejected() {
        let err = canonical_value(1e306, "MWh").unwrap_err();
        assert!(matches!(err, Error::Validation { field: "value", .. }));
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_unit_round_trip_str() {
        for unit in [Unit::Wh, Unit::KWh, Unit::MWh] {
            assert_eq!(unit.as_str().parse::<Unit>().unwrap(), unit);
            assert_eq!(unit.to_string(), unit.as_str());
        }
    }

    // =========================================================================
    // Rounding
    // =========================================================================

    #[test]
    fn test_round_value_removes_float_noise() {
        assert_eq!(round_value(1025.3 - 1012.5), 12.8);
        assert_eq!(round_value(0.1 + 0.2), 0.3);
    }

    #[test]
    fn test_round_value_too_large_to_scale() {
        assert_eq!(round_value(1e303), 1e303);
        assert_eq!(round_value(f64::MAX), f64::MAX);
    }

    #[test]
    fn test_round_value_keeps_six_decimals() {
        assert_eq!(round_value(1.2345674), 1.234567);
        assert_eq!(round_value(-3.0000004), -3.0);
    }

    // =========================================================================
    // Timestamps
    // =========================================================================

    #[test]
    fn test_parse_utc_z() {
        let ts = parse_timestamp("2026-01-01T10:00:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_converts_offset_to_utc() {
        let ts = parse_timestamp("2026-01-01T10:00:00+05:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 1, 1, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_equivalent_instants_are_equal() {
        let a = parse_timestamp("2026-01-01T12:00:00+02:00").unwrap();
        let b = parse_timestamp("2026-01-01T10:00:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejects_naive() {
        let err = parse_timestamp("2026-01-01T10:00:00").unwrap_err();
        assert!(matches!(err, Error::Validation { field: "timestamp", .. }));
        assert!(err.to_string().contains("no timezone offset"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, Error::Validation { field: "timestamp", .. }));
        assert!(err.to_string().contains("not an RFC 3339 timestamp"));
    }

    #[test]
    fn test_parse_truncates_to_microseconds() {
        let ts = parse_timestamp("2026-01-01T10:00:00.123456789Z").unwrap();
        assert_eq!(ts.nanosecond(), 123_456_000);
    }
}
