//! Ingest pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use meterline_core::{DEFAULT_SUSPICIOUS_JUMP_KWH, DeltaRules};

/// Configuration for the measurement store and ingest pipeline.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Deltas above this many kWh are flagged as suspicious jumps.
    pub suspicious_jump_threshold: f64,
    /// How long a writer waits for the database lock before failing
    /// with a contention error.
    pub busy_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/meterline.db"),
            suspicious_jump_threshold: DEFAULT_SUSPICIOUS_JUMP_KWH,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl IngestConfig {
    pub fn delta_rules(&self) -> DeltaRules {
        DeltaRules::new(self.suspicious_jump_threshold)
    }
}
