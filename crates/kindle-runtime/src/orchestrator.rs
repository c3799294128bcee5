//! Corpus-level orchestration.
//!
//! [`LogCorpus`] runs the file processor over an ordered set of log files,
//! hands the carried state from each file to the next, and aggregates the
//! per-file results into corpus-wide durations and books.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kindle_core::error::Result;
use kindle_core::models::Thresholds;
use kindle_core::time_utils::{format_log_time, DeviceZone};
use kindle_data::books::Book;
use kindle_data::processor::{CarryState, FileResult, LogFileProcessor};
use kindle_data::reader::{find_log_files, RotatedName};
use tracing::{debug, error, info, warn};

use crate::checkpoint::CorpusCheckpoint;

// ── LogCorpus ─────────────────────────────────────────────────────────────────

/// All processed log files and the state carried out of the last one.
pub struct LogCorpus {
    processor: LogFileProcessor,
    /// State a cold start begins from.
    initial: CarryState,
    state: CarryState,
    files: Vec<FileResult>,
}

impl LogCorpus {
    /// A fresh corpus for a device logging in `device_zone`.
    pub fn new(thresholds: Thresholds, device_zone: DeviceZone) -> Self {
        let initial = CarryState::new(device_zone);
        Self {
            processor: LogFileProcessor::new(thresholds),
            state: initial.clone(),
            initial,
            files: Vec::new(),
        }
    }

    /// Resume from a stored checkpoint.
    pub fn from_checkpoint(
        thresholds: Thresholds,
        device_zone: DeviceZone,
        checkpoint: CorpusCheckpoint,
    ) -> Self {
        let mut corpus = Self::new(thresholds, device_zone);
        corpus.state = checkpoint.state;
        corpus.files = checkpoint.files;
        corpus
    }

    pub fn state(&self) -> &CarryState {
        &self.state
    }

    pub fn files(&self) -> &[FileResult] {
        &self.files
    }

    /// Snapshot for the next run.
    pub fn checkpoint(&self) -> CorpusCheckpoint {
        CorpusCheckpoint {
            state: self.state.clone(),
            files: self.files.clone(),
        }
    }

    // ── Processing ────────────────────────────────────────────────────────

    /// Process `paths` exactly in the order given.
    ///
    /// Returns the number of files processed. Files that cannot be used are
    /// logged and skipped; errors that invalidate the whole corpus abort.
    pub fn process_files(&mut self, paths: &[PathBuf]) -> Result<usize> {
        info!(
            "Processing specified logfiles: {}",
            paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut processed = 0;
        for path in paths {
            if self.process_one(path)? {
                processed += 1;
            }
        }
        self.finish(processed);
        Ok(processed)
    }

    /// Process the rotated logs in `dir` that are newer than the carried
    /// state.
    ///
    /// A newer copy of the most recently processed log replaces it: the
    /// older copy's result is dropped and the carried state rewinds to the
    /// file before it.
    pub fn process_directory(&mut self, dir: &Path) -> Result<usize> {
        info!("Processing logs from {}", dir.display());
        let mut last_seen: Option<RotatedName> = None;
        let mut processed = 0;

        for (rotated, path) in find_log_files(dir) {
            if self
                .state
                .last_filename
                .as_deref()
                .is_some_and(|last| rotated.name.as_str() <= last)
            {
                debug!("Already processed {}", rotated.name);
                last_seen = Some(rotated);
                continue;
            }
            if last_seen.as_ref().is_some_and(|prev| rotated.supersedes(prev)) {
                self.retract_last(&rotated.name);
            }
            if self.process_one(&path)? {
                processed += 1;
                last_seen = Some(rotated);
            }
        }
        self.finish(processed);
        Ok(processed)
    }

    /// Process one file; `Ok(false)` when the file had to be skipped.
    fn process_one(&mut self, path: &Path) -> Result<bool> {
        match self.processor.process(path, &self.state) {
            Ok(result) => {
                info!(
                    "Parsed {}. {} -> {}.",
                    result.filename,
                    format_log_time(&result.start),
                    format_log_time(&result.end)
                );
                debug!("States: {}", result.format_states());
                debug!("Carried state: {:?}", result.outgoing);
                self.state = result.outgoing.clone();
                self.files.push(result);
                Ok(true)
            }
            Err(e) if e.is_file_fatal() => {
                error!(error = %e, "Could not parse {}!", path.display());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn retract_last(&mut self, newer: &str) {
        if let Some(old) = self.files.pop() {
            info!("Ignoring {} in favour of {}", old.filename, newer);
        }
        self.state = self
            .files
            .last()
            .map(|f| f.outgoing.clone())
            .unwrap_or_else(|| self.initial.clone());
    }

    fn finish(&mut self, processed: usize) {
        self.files.sort_by_key(|f| f.start);
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => info!(
                "Processed {} new logs, {} in total. {} => {}",
                processed,
                self.files.len(),
                format_log_time(&start),
                format_log_time(&end)
            ),
            _ => warn!("No usable logs found"),
        }
    }

    // ── Aggregates ────────────────────────────────────────────────────────

    /// Start of the earliest file.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.files.first().map(|f| f.start)
    }

    /// End of the latest file.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.files.last().map(|f| f.end)
    }

    /// Seconds spent in each power state across all files.
    pub fn state_durations(&self) -> BTreeMap<String, i64> {
        let mut totals = BTreeMap::new();
        for file in &self.files {
            for (state, secs) in &file.durations {
                *totals.entry(state.clone()).or_insert(0) += secs;
            }
        }
        totals
    }

    /// Books merged across files, without books that were never read.
    ///
    /// Fails when a file's events for a book start before the previous
    /// file's events ended.
    pub fn books(&self) -> Result<BTreeMap<String, Book>> {
        let mut merged: BTreeMap<String, Book> = BTreeMap::new();
        for file in &self.files {
            for book in file.books.values() {
                merged
                    .entry(book.asin.clone())
                    .or_insert_with(|| book.empty_copy())
                    .events
                    .extend_from(&book.asin, book.events.events().to_vec())?;
            }
        }
        let thresholds = self.processor.thresholds();
        merged.retain(|_, book| !book.reads_with(thresholds).is_empty());
        Ok(merged)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
