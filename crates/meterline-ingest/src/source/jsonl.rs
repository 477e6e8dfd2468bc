//! JSONL request source adapter.
//!
//! Reads ingest requests from JSONL files (one JSON request per line) and
//! hands each parsed request to the pipeline.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use meterline_core::IngestRequest;

use super::{RequestSource, SourceStats};
use crate::{Error, Result};

/// Configuration for the JSONL source.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Input file or directory path.
    pub input: PathBuf,

    /// Continue past malformed lines and handler errors.
    pub continue_on_error: bool,

    /// Limit number of files to process.
    pub limit: Option<usize>,

    /// Progress reporting interval (requests).
    pub progress_interval: usize,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            continue_on_error: true,
            limit: None,
            progress_interval: 10_000,
        }
    }
}

/// JSONL file request source.
pub struct JsonlSource {
    config: JsonlConfig,
}

impl JsonlSource {
    pub fn new(config: JsonlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JsonlConfig {
        &self.config
    }

    /// Collect files to process based on input path.
    fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let input = &self.config.input;
        let mut files = if input.is_file() {
            vec![input.clone()]
        } else if input.is_dir() {
            let mut entries: Vec<_> = fs::read_dir(input)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .is_some_and(|ext| ext == "jsonl" || ext == "json" || ext == "ndjson")
                })
                .collect();

            // Sort for deterministic processing order
            entries.sort();
            entries
        } else {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Input path does not exist: {}", input.display()),
            )));
        };

        if let Some(limit) = self.config.limit {
            files.truncate(limit);
        }

        Ok(files)
    }

    /// Process a single JSONL file. Returns `false` when the handler asked
    /// to stop.
    fn process_file<F>(&self, path: &Path, handler: &mut F, stats: &mut SourceStats) -> Result<bool>
    where
        F: FnMut(IngestRequest) -> Result<bool>,
    {
        let reader = BufReader::new(File::open(path)?);

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            stats.total_requests += 1;

            let request = match IngestRequest::from_json(&line) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("{}:{}: parse error: {}", path.display(), line_num + 1, e);
                    stats.parse_errors += 1;
                    if self.config.continue_on_error {
                        continue;
                    }
                    return Err(e.into());
                }
            };
            stats.parsed_requests += 1;

            match handler(request) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!("Handler signaled stop");
                    return Ok(false);
                }
                Err(e) => {
                    if self.config.continue_on_error {
                        tracing::warn!("Handler error: {}", e);
                    } else {
                        return Err(e);
                    }
                }
            }

            if self.config.progress_interval > 0
                && stats.total_requests.is_multiple_of(self.config.progress_interval)
            {
                tracing::info!(
                    "Progress: {} requests, {} parsed, {} parse errors",
                    stats.total_requests,
                    stats.parsed_requests,
                    stats.parse_errors
                );
            }
        }

        Ok(true)
    }
}

impl RequestSource for JsonlSource {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn process<F>(&mut self, mut handler: F) -> Result<SourceStats>
    where
        F: FnMut(IngestRequest) -> Result<bool>,
    {
        let mut stats = SourceStats::default();

        let files = self.collect_files()?;
        tracing::info!("Found {} JSONL files to process", files.len());

        for (file_idx, path) in files.iter().enumerate() {
            tracing::info!(
                "[{}/{}] Processing: {}",
                file_idx + 1,
                files.len(),
                path.display()
            );
            stats.bytes_read += fs::metadata(path)?.len() as usize;
            stats.files_processed += 1;

            match self.process_file(path, &mut handler, &mut stats) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!("Error processing {}: {}", path.display(), e);
                    if !self.config.continue_on_error {
                        return Err(e);
                    }
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const LINE_A: &str = r#"{"device_id":"m1","building_id":"b1","timestamp":"2026-01-01T10:00:00Z","metric_type":"energy","value":1.0,"unit":"kWh"}"#;
    const LINE_B: &str = r#"{"device_id":"m1","building_id":"b1","timestamp":"2026-01-01T11:00:00Z","metric_type":"energy","value":2.0,"unit":"kWh"}"#;

    fn write_file(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    fn collect(config: JsonlConfig) -> (Result<SourceStats>, Vec<IngestRequest>) {
        let mut seen = Vec::new();
        let result = JsonlSource::new(config).process(|req| {
            seen.push(req);
            Ok(true)
        });
        (result, seen)
    }

    #[test]
    fn test_reads_single_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "a.jsonl", &[LINE_A, "", LINE_B]);

        let (result, seen) = collect(JsonlConfig {
            input: path,
            ..Default::default()
        });
        let stats = result.unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.parsed_requests, 2);
        assert_eq!(stats.files_processed, 1);
        assert_eq!(seen[1].value, 2.0);
    }

    #[test]
    fn test_directory_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "b.ndjson", &[LINE_B]);
        write_file(dir.path(), "a.jsonl", &[LINE_A]);
        write_file(dir.path(), "notes.txt", &["not json"]);

        let (result, seen) = collect(JsonlConfig {
            input: dir.path().to_path_buf(),
            ..Default::default()
        });
        assert_eq!(result.unwrap().files_processed, 2);
        let values: Vec<_> = seen.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_limit_files() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.jsonl", &[LINE_A]);
        write_file(dir.path(), "b.jsonl", &[LINE_B]);

        let (result, seen) = collect(JsonlConfig {
            input: dir.path().to_path_buf(),
            limit: Some(1),
            ..Default::default()
        });
        assert_eq!(result.unwrap().files_processed, 1);
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_parse_errors_skipped() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "a.jsonl", &[LINE_A, "{broken", LINE_B]);

        let (result, seen) = collect(JsonlConfig {
            input: path,
            ..Default::default()
        });
        let stats = result.unwrap();
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_parse_error_aborts_when_strict() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "a.jsonl", &["{broken", LINE_A]);

        let (result, seen) = collect(JsonlConfig {
            input: path,
            continue_on_error: false,
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Core(_))));
        assert!(seen.is_empty());
    }

    #[test]
    fn test_handler_stop() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "a.jsonl", &[LINE_A, LINE_B]);

        let mut count = 0;
        let stats = JsonlSource::new(JsonlConfig {
            input: path,
            ..Default::default()
        })
        .process(|_| {
            count += 1;
            Ok(false)
        })
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(stats.parsed_requests, 1);
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let (result, _) = collect(JsonlConfig {
            input: dir.path().join("missing.jsonl"),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
