//! Outcome classification and the run report.
//!
//! Every processed message lands in exactly one bucket:
//!
//! | Handler result              | Bucket     |
//! |-----------------------------|------------|
//! | `Ok(())`                    | created    |
//! | `AlreadyExists`             | duplicated |
//! | `InvalidSku` / `Creating`   | invalid    |
//!
//! Counters are atomics so any number of handling units can record
//! concurrently without lost updates.

use crate::sku::CreateSkuError;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bucket a processed message falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Duplicated,
    Invalid,
}

impl Outcome {
    pub fn classify(result: &Result<(), CreateSkuError>) -> Self {
        match result {
            Ok(()) => Outcome::Created,
            Err(CreateSkuError::AlreadyExists(_)) => Outcome::Duplicated,
            Err(CreateSkuError::InvalidSku(_)) | Err(CreateSkuError::Creating { .. }) => {
                Outcome::Invalid
            }
        }
    }
}

/// Live counters shared by all handling units
#[derive(Debug, Default)]
pub struct Report {
    created: AtomicU64,
    duplicated: AtomicU64,
    invalid: AtomicU64,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Created => &self.created,
            Outcome::Duplicated => &self.duplicated,
            Outcome::Invalid => &self.invalid,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the counters. Only meaningful once every unit has joined.
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            created: self.created.load(Ordering::Acquire),
            duplicated: self.duplicated.load(Ordering::Acquire),
            invalid: self.invalid.load(Ordering::Acquire),
        }
    }
}

/// Final tally of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub created: u64,
    pub duplicated: u64,
    pub invalid: u64,
}

#[cfg(test)]
impl ReportSummary {
    pub fn total(&self) -> u64 {
        self.created + self.duplicated + self.invalid
    }
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Received {} unique product skus, {} duplicates, {} discard values",
            self.created, self.duplicated, self.invalid
        )
    }
}

/// Destination of the final report line
pub trait ReportSink: Send + Sync {
    fn emit(&self, summary: &ReportSummary) -> io::Result<()>;
}

/// Appends the report line to a file
#[derive(Debug, Clone)]
pub struct FileReportSink {
    path: PathBuf,
}

impl FileReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for FileReportSink {
    fn emit(&self, summary: &ReportSummary) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{summary}")
    }
}

/// Keeps report lines in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    lines: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ReportSink for MemoryReportSink {
    fn emit(&self, summary: &ReportSummary) -> io::Result<()> {
        self.lines.lock().unwrap().push(summary.to_string());
        Ok(())
    }
}
