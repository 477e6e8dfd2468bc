//! Meterline JSONL replay.
//!
//! Feeds recorded ingest requests through the full pipeline, exactly as
//! the HTTP endpoint would. Replaying the same files twice is safe: every
//! already-ingested reading is reported as a duplicate.
//!
//! # Usage
//!
//! ```bash
//! # Single file
//! meterline-ingest -i readings.jsonl
//!
//! # Directory of JSONL files into a specific database
//! meterline-ingest -i ./recordings/ --db-path /var/lib/meterline/meterline.db
//!
//! # With metrics
//! meterline-ingest -i ./recordings/ --metrics-port 9091
//! ```
//!
//! Ctrl+C stops between two requests; everything committed so far stays
//! committed.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use meterline_core::metrics::{init_metrics, set_gauge, start_metrics_server};
use meterline_ingest::source::{JsonlConfig, JsonlSource, RequestSource, SourceStats};
use meterline_ingest::{IngestConfig, IngestOutcome, Ingestor};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Replay JSONL telemetry through the Meterline ingest pipeline.
#[derive(Parser, Debug)]
#[command(name = "meterline-ingest")]
#[command(about = "Replay JSONL ingest requests into the measurement store")]
#[command(version)]
struct Args {
    /// Input JSONL file or directory path
    #[arg(short, long)]
    input: PathBuf,

    /// SQLite database path
    #[arg(long, env = "METERLINE_DB_PATH", default_value = "./data/meterline.db")]
    db_path: PathBuf,

    /// Deltas above this many kWh are flagged as suspicious jumps
    #[arg(long, env = "METERLINE_SUSPICIOUS_JUMP_KWH", default_value = "10000")]
    suspicious_jump_kwh: f64,

    /// Continue past malformed lines
    #[arg(long, default_value = "true", action = ArgAction::Set)]
    continue_on_error: bool,

    /// Limit number of files to process
    #[arg(long)]
    limit: Option<usize>,

    /// Log progress every N requests
    #[arg(long, default_value = "10000")]
    progress_interval: usize,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,
}

/// Outcome tallies for one replay run.
#[derive(Debug, Default)]
struct Tally {
    created: usize,
    duplicate: usize,
    rejected: usize,
    conflict: usize,
    failed: usize,
}

impl Tally {
    fn record(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Created(_) => self.created += 1,
            IngestOutcome::Duplicate(_) => self.duplicate += 1,
            IngestOutcome::Rejected(_) => self.rejected += 1,
            IngestOutcome::Conflict(_) => self.conflict += 1,
            IngestOutcome::Failed(_) => self.failed += 1,
        }
    }

    fn total(&self) -> usize {
        self.created + self.duplicate + self.rejected + self.conflict + self.failed
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.metrics_port > 0 {
        let handle = init_metrics().context("Failed to install metrics recorder")?;
        start_metrics_server(args.metrics_port, handle)
            .await
            .context("Failed to start metrics server")?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping after the current request...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let config = IngestConfig {
        db_path: args.db_path.clone(),
        suspicious_jump_threshold: args.suspicious_jump_kwh,
        ..Default::default()
    };
    let ingestor = Ingestor::open(&config)
        .with_context(|| format!("Failed to open store at {}", config.db_path.display()))?;

    let mut source = JsonlSource::new(JsonlConfig {
        input: args.input.clone(),
        continue_on_error: args.continue_on_error,
        limit: args.limit,
        progress_interval: args.progress_interval,
    });
    info!("Replaying {} via {} source", args.input.display(), source.name());

    let start = Instant::now();
    let mut tally = Tally::default();
    let stats = source.process(|request| {
        let outcome = ingestor.ingest(&request);
        tally.record(&outcome);

        let elapsed = start.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            set_gauge("ingest_events_per_second", tally.total() as f64 / elapsed);
        }
        Ok(running.load(Ordering::SeqCst))
    })?;

    print_summary(&args, &stats, &tally, start.elapsed());
    Ok(())
}

fn print_summary(args: &Args, stats: &SourceStats, tally: &Tally, elapsed: Duration) {
    println!("\n══════════════════════════════════════════════════════════════════");
    println!("SUMMARY");
    println!("══════════════════════════════════════════════════════════════════\n");

    println!("Input:       {}", args.input.display());
    println!("Database:    {}", args.db_path.display());
    println!();
    println!("Files processed:   {:>12}", stats.files_processed);
    println!("Bytes read:        {:>12}", stats.bytes_read);
    println!("Requests:          {:>12}", stats.total_requests);
    println!("Parse errors:      {:>12}", stats.parse_errors);
    println!();
    println!("Created:           {:>12}", tally.created);
    println!("Duplicate:         {:>12}", tally.duplicate);
    println!("Rejected:          {:>12}", tally.rejected);
    println!("Conflict:          {:>12}", tally.conflict);
    println!("Failed:            {:>12}", tally.failed);
    println!();
    println!("Elapsed time:      {:>12.2?}", elapsed);

    if tally.total() > 0 {
        let per_sec = tally.total() as f64 / elapsed.as_secs_f64();
        println!("Throughput:        {:>12.0} requests/sec", per_sec);
    }

    println!();
}
