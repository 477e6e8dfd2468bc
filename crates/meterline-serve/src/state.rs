//! Application state and configuration.

use std::path::PathBuf;
use std::sync::Arc;

use meterline_core::DEFAULT_SUSPICIOUS_JUMP_KWH;
use meterline_ingest::{IngestConfig, Ingestor};

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Path to the SQLite measurement database.
    pub db_path: PathBuf,

    /// Deltas above this many kWh are flagged as suspicious jumps.
    pub suspicious_jump_threshold: f64,

    /// Prometheus exporter port (0 disables the exporter).
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let ingest = IngestConfig::default();
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            db_path: ingest.db_path,
            suspicious_jump_threshold: ingest.suspicious_jump_threshold,
            metrics_port: 0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `METERLINE_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `METERLINE_DB_PATH`: SQLite database path (default: "./data/meterline.db")
    /// - `METERLINE_SUSPICIOUS_JUMP_KWH`: Jump threshold in kWh (default: 10000)
    /// - `METERLINE_METRICS_PORT`: Prometheus exporter port (default: 0, disabled)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_addr = lookup("METERLINE_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let db_path = lookup("METERLINE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let suspicious_jump_threshold = match lookup("METERLINE_SUSPICIOUS_JUMP_KWH") {
            Some(raw) => {
                let value: f64 = raw.trim().parse().map_err(|_| {
                    anyhow::anyhow!("METERLINE_SUSPICIOUS_JUMP_KWH must be a number, got '{raw}'")
                })?;
                if !value.is_finite() || value < 0.0 {
                    anyhow::bail!(
                        "METERLINE_SUSPICIOUS_JUMP_KWH must be a non-negative number, got '{raw}'"
                    );
                }
                value
            }
            None => DEFAULT_SUSPICIOUS_JUMP_KWH,
        };

        let metrics_port = match lookup("METERLINE_METRICS_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                anyhow::anyhow!("METERLINE_METRICS_PORT must be a port number, got '{raw}'")
            })?,
            None => defaults.metrics_port,
        };

        tracing::info!(
            bind_addr = %bind_addr,
            db_path = %db_path.display(),
            suspicious_jump_threshold,
            metrics_port,
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            db_path,
            suspicious_jump_threshold,
            metrics_port,
        })
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            db_path: self.db_path.clone(),
            suspicious_jump_threshold: self.suspicious_jump_threshold,
            ..Default::default()
        }
    }
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ingest pipeline; also owns the store used by read queries.
    pub ingestor: Arc<Ingestor>,

    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the measurement store described by `config`.
    pub fn new(config: Config) -> meterline_ingest::Result<Self> {
        let ingestor = Ingestor::open(&config.ingest_config())?;
        Ok(Self::with_ingestor(Arc::new(ingestor), config))
    }

    pub fn with_ingestor(ingestor: Arc<Ingestor>, config: Config) -> Self {
        Self {
            ingestor,
            config: Arc::new(config),
        }
    }
}
