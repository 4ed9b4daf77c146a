//! Per-file processing: open, validate and publish every row, aggregate the
//! outcome, relocate the file
//!
//! The file runs `Opened → Reading → Closed → Relocating → Done` exactly
//! once. A single bad row never aborts the file; open/header failures route
//! the whole file to the error directory with no rows processed.

use chrono::Utc;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::fileflow::kafka::{BrokerPublisher, PublishOutcome, RecordSink};

use super::relocate::relocate;
use super::scanner::CandidateFile;
use super::validator::{parse_fields, RowValidator};

const PROGRESS_EVERY: usize = 500;

/// Aggregate outcome over all rows of one file. Determines the relocation
/// target: only `AllDelivered` goes to the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    AllDelivered { total: usize },
    PartialFailure { failed: usize, total: usize },
    TotalFailure { reason: String },
}

impl FileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::AllDelivered { .. } => "all_delivered",
            FileOutcome::PartialFailure { .. } => "partial_failure",
            FileOutcome::TotalFailure { .. } => "total_failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::AllDelivered { .. })
    }
}

/// One failed row, kept for the summary log and the failure report.
#[derive(Debug, Clone)]
struct RowFailure {
    row_index: usize,
    reason: String,
}

/// Orchestrates the per-file pipeline. Shared config and the broker
/// connection come in as explicit context so tests can run it against a
/// fake sink and temp directories.
pub struct FileProcessor<S: RecordSink> {
    publisher: BrokerPublisher<S>,
    validator: RowValidator,
    archive_dir: PathBuf,
    error_dir: PathBuf,
}

impl<S: RecordSink> FileProcessor<S> {
    pub fn new(
        publisher: BrokerPublisher<S>,
        validator: RowValidator,
        archive_dir: PathBuf,
        error_dir: PathBuf,
    ) -> Self {
        Self {
            publisher,
            validator,
            archive_dir,
            error_dir,
        }
    }

    /// Process one candidate file end-to-end and return its outcome.
    pub async fn process(&self, candidate: &CandidateFile) -> FileOutcome {
        let path = &candidate.path;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        log::info!("processing file: {}", name);

        let (outcome, failures) = self.run_rows(path, &name).await;

        let target = if outcome.is_success() {
            &self.archive_dir
        } else {
            &self.error_dir
        };

        let moved_to = match relocate(path, target) {
            Ok(dest) => Some(dest),
            Err(e) if outcome.is_success() => {
                // The rows are already delivered; the file must still leave
                // the watch directory, so fall back to the error side.
                log::error!("failed to archive '{}': {}; moving to error directory", name, e);
                match relocate(path, &self.error_dir) {
                    Ok(dest) => Some(dest),
                    Err(e2) => {
                        log::error!("failed to move '{}' to error directory: {}", name, e2);
                        None
                    }
                }
            }
            Err(e) => {
                log::error!("failed to move '{}' to error directory: {}", name, e);
                None
            }
        };

        if !outcome.is_success() {
            self.write_failure_report(&name, &outcome, &failures);
        }

        match &outcome {
            FileOutcome::AllDelivered { total } => log::info!(
                "finished '{}': outcome={} delivered={} total={} moved_to={:?}",
                name,
                outcome.label(),
                total,
                total,
                moved_to
            ),
            FileOutcome::PartialFailure { failed, total } => log::warn!(
                "finished '{}': outcome={} failed={} total={} moved_to={:?}",
                name,
                outcome.label(),
                failed,
                total,
                moved_to
            ),
            FileOutcome::TotalFailure { reason } => log::error!(
                "finished '{}': outcome={} reason='{}' moved_to={:?}",
                name,
                outcome.label(),
                reason,
                moved_to
            ),
        }

        outcome
    }

    /// `Opened → Reading → Closed`: the reader is scoped to this call, so
    /// the handle is released before relocation on every exit path.
    async fn run_rows(&self, path: &Path, name: &str) -> (FileOutcome, Vec<RowFailure>) {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                return (
                    FileOutcome::TotalFailure {
                        reason: format!("could not open file: {}", e),
                    },
                    Vec::new(),
                )
            }
        };
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        // Header: first non-blank line
        let header = loop {
            match lines.next() {
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    break parse_fields(&line);
                }
                Some(Err(e)) => {
                    return (
                        FileOutcome::TotalFailure {
                            reason: format!("could not read header row: {}", e),
                        },
                        Vec::new(),
                    )
                }
                None => {
                    return (
                        FileOutcome::TotalFailure {
                            reason: "empty file: no header row".to_string(),
                        },
                        Vec::new(),
                    )
                }
            }
        };

        let mut total = 0usize;
        let mut delivered = 0usize;
        let mut failures: Vec<RowFailure> = Vec::new();

        for line in lines {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    // Read error mid-file: count it, stop reading
                    failures.push(RowFailure {
                        row_index: total + 1,
                        reason: format!("read error: {}", e),
                    });
                    total += 1;
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            total += 1;
            let row_index = total;

            let fields = parse_fields(&line);
            let validated = match self.validator.validate(&header, row_index, &fields) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("{}: validation failed: {}", name, e);
                    failures.push(RowFailure {
                        row_index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self
                .publisher
                .publish(validated.key.as_deref(), &validated.payload)
                .await
            {
                PublishOutcome::Delivered => {
                    delivered += 1;
                    if delivered % PROGRESS_EVERY == 0 {
                        log::info!("{}: delivered {} rows so far", name, delivered);
                    }
                }
                PublishOutcome::Rejected(reason) => {
                    log::warn!("{}: row {} rejected by broker: {}", name, row_index, reason);
                    failures.push(RowFailure {
                        row_index,
                        reason: format!("rejected by broker: {}", reason),
                    });
                }
                PublishOutcome::TransientFailure(reason) => {
                    log::warn!(
                        "{}: row {} failed after retries exhausted: {}",
                        name,
                        row_index,
                        reason
                    );
                    failures.push(RowFailure {
                        row_index,
                        reason: format!("publish retries exhausted: {}", reason),
                    });
                }
            }
        }

        self.publisher.flush();

        let outcome = if failures.is_empty() {
            FileOutcome::AllDelivered { total }
        } else if delivered == 0 {
            FileOutcome::TotalFailure {
                reason: format!("no rows delivered ({} attempted)", total),
            }
        } else {
            FileOutcome::PartialFailure {
                failed: failures.len(),
                total,
            }
        };
        (outcome, failures)
    }

    /// Drop a human-readable failure report next to the relocated file so an
    /// operator can diagnose without replaying the source bytes.
    fn write_failure_report(&self, name: &str, outcome: &FileOutcome, failures: &[RowFailure]) {
        if let Err(e) = std::fs::create_dir_all(&self.error_dir) {
            log::warn!("could not create error directory for report: {}", e);
            return;
        }
        let ts = Utc::now().format("%Y%m%dT%H%M%S");
        let report_path = self.error_dir.join(format!("error_{}_{}.log", name, ts));

        let result = File::create(&report_path).and_then(|mut f| {
            writeln!(f, "Timestamp (UTC): {}", ts)?;
            writeln!(f, "File: {}", name)?;
            writeln!(f, "Outcome: {}", outcome.label())?;
            if let FileOutcome::TotalFailure { reason } = outcome {
                writeln!(f, "Reason: {}", reason)?;
            }
            writeln!(f, "Failed rows: {}", failures.len())?;
            writeln!(f)?;
            for failure in failures {
                writeln!(f, "row {}: {}", failure.row_index, failure.reason)?;
            }
            Ok(())
        });

        match result {
            Ok(()) => log::debug!("wrote failure report at {}", report_path.display()),
            Err(e) => log::warn!("failed to write failure report: {}", e),
        }
    }
}
