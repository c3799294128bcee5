//! Per-file log processing.
//!
//! A [`LogFileProcessor`] reads one log file line by line, corrects every
//! timestamp and dispatches each classified line to exactly one tracker.
//! The carried [`CarryState`] flows in from the previous file and out to
//! the next one through the [`FileResult`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kindle_core::error::{KindleError, Result};
use kindle_core::models::{PowerState, PowerStatus, Thresholds, Transition};
use kindle_core::time_utils::{format_log_time, parse_log_timestamp, DeviceZone};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::books::Book;
use crate::classifier::{BookLine, LineClassifier, LineKind};
use crate::normalizer::{ClockState, JumpOutcome, LineContext, TimeNormalizer};
use crate::power::PowerStateTracker;

/// Booklet name of the reader application.
const READER_BOOKLET: &str = "Bookworm";

// ── Carried state ─────────────────────────────────────────────────────────────

/// Everything one file hands over to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryState {
    /// Base name of the last file processed.
    pub last_filename: Option<String>,
    pub clock: ClockState,
    pub power: Option<PowerStatus>,
    /// ASIN of the book currently in hand.
    pub book: Option<String>,
}

impl CarryState {
    /// A cold-start state with the device logging in `zone`.
    pub fn new(zone: DeviceZone) -> Self {
        Self {
            clock: ClockState::new(zone),
            ..Self::default()
        }
    }
}

// ── FileResult ────────────────────────────────────────────────────────────────

/// What processing one file produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    pub filename: String,
    /// Corrected time of the first accepted line.
    pub start: DateTime<Utc>,
    /// Corrected time of the last accepted line.
    pub end: DateTime<Utc>,
    pub transitions: Vec<Transition>,
    /// Seconds spent in each power state, keyed by state label.
    pub durations: BTreeMap<String, i64>,
    /// Books touched in this file, with this file's events only.
    pub books: BTreeMap<String, Book>,
    pub outgoing: CarryState,
}

impl FileResult {
    /// One-line summary: covered range and per-state durations, longest first.
    pub fn format_states(&self) -> String {
        let mut durations: Vec<_> = self.durations.iter().collect();
        durations.sort_by(|a, b| b.1.cmp(a.1));
        let mut out = format!(
            "{} -> {}:",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        );
        for (state, secs) in durations {
            out.push_str(&format!(" {}={}", state, secs));
        }
        out
    }
}

// ── LogFileProcessor ──────────────────────────────────────────────────────────

/// Turns one log file into a [`FileResult`].
pub struct LogFileProcessor {
    thresholds: Thresholds,
    classifier: LineClassifier,
    normalizer: TimeNormalizer,
}

impl Default for LogFileProcessor {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl LogFileProcessor {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            normalizer: TimeNormalizer::new(thresholds.clone()),
            classifier: LineClassifier::new(),
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Process the log file at `path`, continuing from `incoming`.
    pub fn process(&self, path: &Path, incoming: &CarryState) -> Result<FileResult> {
        let file = File::open(path).map_err(|source| KindleError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.process_reader(&name, BufReader::new(file), incoming)
            .map_err(|e| match e {
                KindleError::NoValidLines(_) => KindleError::NoValidLines(path.to_path_buf()),
                KindleError::FileRead { source, .. } => KindleError::FileRead {
                    path: path.to_path_buf(),
                    source,
                },
                other => other,
            })
    }

    /// Process log text from any reader; `name` identifies it in
    /// diagnostics and becomes the carried `last_filename`.
    pub fn process_reader<R: BufRead>(
        &self,
        name: &str,
        reader: R,
        incoming: &CarryState,
    ) -> Result<FileResult> {
        let mut parse = FileParse {
            processor: self,
            clock: incoming.clock.clone(),
            book: incoming.book.clone(),
            power: PowerStateTracker::resume(incoming.power.clone()),
            books: BTreeMap::new(),
            start: None,
        };

        for (idx, line) in reader.split(b'\n').enumerate() {
            let bytes = line.map_err(|source| KindleError::FileRead {
                path: PathBuf::from(name),
                source,
            })?;
            let text = String::from_utf8_lossy(&bytes);
            let ctx = LineContext {
                file: name,
                line: idx + 1,
            };
            parse.line(&text, &ctx)?;
        }

        parse.finish(name)
    }
}

// ── Per-file working state ────────────────────────────────────────────────────

struct FileParse<'p> {
    processor: &'p LogFileProcessor,
    clock: ClockState,
    book: Option<String>,
    power: PowerStateTracker,
    books: BTreeMap<String, Book>,
    start: Option<DateTime<Utc>>,
}

impl FileParse<'_> {
    fn line(&mut self, line: &str, ctx: &LineContext<'_>) -> Result<()> {
        let normalizer = &self.processor.normalizer;
        let Some(naive) = parse_log_timestamp(line) else {
            debug!("{} Invalid line. Skipping!", ctx);
            return Ok(());
        };
        let raw = normalizer.localize(&self.clock, &naive);
        let correction = normalizer.normalize(&mut self.clock, raw, self.start.is_none(), ctx)?;
        let ts = correction.timestamp;
        if correction.outcome != JumpOutcome::Steady || correction.correction_secs() != 0 {
            debug!("{} {} {:?}", ctx, correction, correction.outcome);
        }

        if let JumpOutcome::FileGap { since } = correction.outcome {
            self.power.transition(since, Some(PowerState::NoData));
            self.power.transition(ts, Some(PowerState::NoData));
        }

        match self.start {
            None => {
                self.start = Some(ts);
                self.power.start_at(ts);
            }
            Some(start) if ts < start => {
                debug!(
                    "{} ts {} is less than file start {}. Ignoring line!",
                    ctx,
                    format_log_time(&ts),
                    format_log_time(&start)
                );
                return Ok(());
            }
            Some(_) => {}
        }

        self.dispatch(line, ts, ctx);
        self.clock.last_ts = Some(ts);
        Ok(())
    }

    /// Offer the line to the trackers; the first that understands it wins.
    fn dispatch(&mut self, line: &str, ts: DateTime<Utc>, ctx: &LineContext<'_>) {
        match self.processor.classifier.classify(line) {
            LineKind::Reboot(marker) => {
                if !self.power.reboot_marker(ts, marker) {
                    debug!("{} Ignoring {:?} outside of a reboot", ctx, marker);
                }
            }
            LineKind::PowerState { from, to } => {
                let file_start = self.start.unwrap_or(ts);
                self.power.reported_change(ts, from, to, file_start, ctx);
            }
            LineKind::Timezone { offset, zone } => {
                self.processor
                    .normalizer
                    .expect_timezone_change(&mut self.clock, offset, zone, ts, ctx);
            }
            LineKind::Book(book_line) => self.book_line(book_line, ts, ctx),
            LineKind::Unmatched => {}
        }
    }

    fn book_line(&mut self, line: BookLine<'_>, ts: DateTime<Utc>, ctx: &LineContext<'_>) {
        let t = &self.processor.thresholds;
        match line {
            BookLine::BookletSwitch { from, to } => {
                debug!("{} Booklet: {} -> {}", ctx, from, to);
                let Some(asin) = self.book.clone() else {
                    return;
                };
                let book = ensure_book(&mut self.books, &asin, None);
                if to == READER_BOOKLET {
                    book.open(ts, None, t);
                } else if from == READER_BOOKLET {
                    book.close(ts, None, t);
                }
            }
            BookLine::Info {
                asin,
                length,
                position,
            } => {
                debug!(
                    "{} Book: {} -> {}. Length={}, position={}",
                    ctx,
                    self.book.as_deref().unwrap_or("None"),
                    asin,
                    length,
                    position
                );
                match self.book.clone() {
                    Some(held) if held == asin => {
                        ensure_book(&mut self.books, asin, Some(length)).open(ts, Some(position), t);
                    }
                    Some(held) => {
                        ensure_book(&mut self.books, &held, None).put_down(ts, t);
                        ensure_book(&mut self.books, asin, Some(length)).pick_up(ts, Some(position), t);
                        self.book = Some(asin.to_string());
                    }
                    None => {
                        ensure_book(&mut self.books, asin, Some(length)).pick_up(ts, Some(position), t);
                        self.book = Some(asin.to_string());
                    }
                }
            }
            BookLine::PositionSync { position } => {
                let Some(asin) = self.book.clone() else {
                    return;
                };
                debug!("{} Book: {}: position={}", ctx, asin, position);
                ensure_book(&mut self.books, &asin, None).close(ts, Some(position), t);
            }
        }
    }

    fn finish(mut self, name: &str) -> Result<FileResult> {
        let (Some(start), Some(end)) = (self.start, self.clock.last_ts) else {
            return Err(KindleError::NoValidLines(PathBuf::from(name)));
        };
        self.power.transition(end, None);
        debug!(
            "{} Finished Processing! File covered {} -> {}",
            name,
            format_log_time(&start),
            format_log_time(&end)
        );

        let (power, transitions, durations) = self.power.into_parts();
        Ok(FileResult {
            filename: name.to_string(),
            start,
            end,
            transitions,
            durations,
            books: self.books,
            outgoing: CarryState {
                last_filename: Some(name.to_string()),
                clock: self.clock,
                power,
                book: self.book,
            },
        })
    }
}

/// Get the book for `asin`, creating it on first reference.
fn ensure_book<'b>(
    books: &'b mut BTreeMap<String, Book>,
    asin: &str,
    length: Option<&str>,
) -> &'b mut Book {
    books
        .entry(asin.to_string())
        .or_insert_with(|| Book::new(asin, length))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
