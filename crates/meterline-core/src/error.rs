//! Error types for the Meterline normalization core.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating and normalizing a reading.
#[derive(Error, Debug)]
pub enum Error {
    /// A request field is missing, malformed, or out of range.
    #[error("invalid field '{field}': {reason}")]
    Validation {
        /// The name of the invalid field.
        field: &'static str,
        /// Description of what's wrong.
        reason: String,
    },

    /// The reading's unit has no canonical conversion.
    #[error("unsupported unit '{unit}' (supported: {supported})")]
    UnsupportedUnit {
        /// The unit as received.
        unit: String,
        /// Comma-separated list of supported units.
        supported: &'static str,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] error.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether this error means the reading itself is unacceptable.
    ///
    /// Rejections are surfaced to the caller and must not be retried
    /// unchanged.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::UnsupportedUnit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Error Display formatting tests
    // =========================================================================

    #[test]
    fn test_validation_display() {
        let err = Error::validation("timestamp", "missing timezone offset");
        let msg = err.to_string();
        assert!(msg.contains("invalid field 'timestamp'"));
        assert!(msg.contains("missing timezone offset"));
    }

    #[test]
    fn test_unsupported_unit_display() {
        let err = Error::UnsupportedUnit {
            unit: "BTU".to_string(),
            supported: "Wh, kWh, MWh",
        };
        let msg = err.to_string();
        assert!(msg.contains("BTU"));
        assert!(msg.contains("Wh, kWh, MWh"));
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn test_rejections() {
        assert!(Error::validation("value", "not finite").is_rejection());
        assert!(
            Error::UnsupportedUnit {
                unit: "J".to_string(),
                supported: "kWh",
            }
            .is_rejection()
        );
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not valid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
        assert!(!err.is_rejection());
        assert!(err.to_string().contains("JSON error"));
    }
}
