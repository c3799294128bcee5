//! Book event logs and reading-session reconstruction.

use chrono::{DateTime, Utc};
use kindle_core::error::{KindleError, Result};
use kindle_core::models::{equal_with_fuzz, BookEvent, EventKind, ReadSession, Thresholds};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Position parsing ──────────────────────────────────────────────────────────

/// Parse a reader position as logged by the device.
///
/// Multi-token values use their last token; fractional values are
/// truncated. Zero and unparseable values mean "no position".
pub fn parse_position(raw: &str, asin: &str) -> Option<u64> {
    let token = raw.rsplit(' ').next().unwrap_or(raw).trim();
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 1.0 => Some(value.trunc() as u64),
        Ok(_) => None,
        Err(e) => {
            debug!("Could not parse position '{}' in book {}: {}", raw, asin, e);
            None
        }
    }
}

// ── EventLog ──────────────────────────────────────────────────────────────────

/// A book's ordered event sequence.
///
/// New events are recorded through [`EventLog::record`], which coalesces
/// bursts of log lines describing the same physical action by replacing
/// the last element instead of appending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<BookEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[BookEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&BookEvent> {
        self.events.last()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Record `kind` at `ts`.
    ///
    /// Coalesces with the last event when the two are within
    /// `coalesce_secs`, or when the last event is `match_old` and within
    /// `old_fuzz_secs`. A coalesced event keeps the earlier timestamp and
    /// takes the new kind. An appended event inherits the previous
    /// position. `position`, when given, overrides either.
    pub fn record(
        &mut self,
        ts: DateTime<Utc>,
        kind: EventKind,
        position: Option<u64>,
        match_old: Option<(EventKind, i64)>,
        coalesce_secs: i64,
    ) {
        let merge = self.events.last().is_some_and(|last| {
            let gap = (last.timestamp - ts).num_seconds();
            equal_with_fuzz(0, gap, coalesce_secs)
                || match_old.is_some_and(|(old_kind, fuzz)| {
                    last.kind == old_kind && equal_with_fuzz(0, gap, fuzz)
                })
        });

        if merge {
            if let Some(last) = self.events.last_mut() {
                last.timestamp = last.timestamp.min(ts);
                last.kind = kind;
            }
        } else {
            let inherited = self.events.last().and_then(|e| e.position);
            self.events.push(BookEvent {
                timestamp: ts,
                kind,
                position: inherited,
            });
        }

        if let (Some(position), Some(last)) = (position, self.events.last_mut()) {
            last.position = Some(position);
        }
    }

    /// Append events from a later file, validating time order.
    pub fn extend_from(&mut self, asin: &str, mut events: Vec<BookEvent>) -> Result<()> {
        events.sort();
        if let (Some(first), Some(last)) = (events.first(), self.events.last()) {
            if first.timestamp < last.timestamp {
                return Err(KindleError::BackwardsEvents {
                    asin: asin.to_string(),
                    last: last.timestamp,
                    next: first.timestamp,
                });
            }
        }
        self.events.extend(events);
        Ok(())
    }
}

// ── Book ──────────────────────────────────────────────────────────────────────

/// A book and everything that happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub asin: String,
    /// Total extent in positions; 0 when unknown.
    pub length: u64,
    pub events: EventLog,
}

impl Book {
    pub fn new(asin: &str, length: Option<&str>) -> Self {
        let length = length
            .filter(|l| !l.is_empty())
            .and_then(|l| parse_position(l, asin))
            .unwrap_or(0);
        Self {
            asin: asin.to_string(),
            length,
            events: EventLog::new(),
        }
    }

    /// A fresh book with the same identity and no events.
    pub fn empty_copy(&self) -> Self {
        Self {
            asin: self.asin.clone(),
            length: self.length,
            events: EventLog::new(),
        }
    }

    pub fn pick_up(&mut self, ts: DateTime<Utc>, position: Option<&str>, t: &Thresholds) {
        self.record(ts, EventKind::PickUp, position, None, t);
    }

    /// Put down replaces a close logged just before it.
    pub fn put_down(&mut self, ts: DateTime<Utc>, t: &Thresholds) {
        let close = Some((EventKind::Close, t.put_down_after_close_secs));
        self.record(ts, EventKind::PutDown, None, close, t);
    }

    pub fn open(&mut self, ts: DateTime<Utc>, position: Option<&str>, t: &Thresholds) {
        self.record(ts, EventKind::Open, position, None, t);
    }

    pub fn close(&mut self, ts: DateTime<Utc>, position: Option<&str>, t: &Thresholds) {
        self.record(ts, EventKind::Close, position, None, t);
    }

    fn record(
        &mut self,
        ts: DateTime<Utc>,
        kind: EventKind,
        position: Option<&str>,
        match_old: Option<(EventKind, i64)>,
        t: &Thresholds,
    ) {
        let position = position
            .filter(|p| !p.is_empty())
            .and_then(|p| parse_position(p, &self.asin));
        self.events
            .record(ts, kind, position, match_old, t.coalesce_secs);
    }

    /// Reading sessions with the default thresholds.
    pub fn reads(&self) -> Vec<ReadSession> {
        self.reads_with(&Thresholds::default())
    }

    /// Fold the event log into accepted, merged reading sessions.
    pub fn reads_with(&self, t: &Thresholds) -> Vec<ReadSession> {
        let mut events = self.events.events().to_vec();
        events.sort();

        let mut sessions = SessionList::new(t);
        let mut first: Option<DateTime<Utc>> = None;
        let mut start: Option<DateTime<Utc>> = None;
        let mut first_pos: Option<u64> = None;
        let mut latest_pos: Option<u64> = None;
        let mut read_secs = 0i64;
        let mut last: Option<&BookEvent> = None;

        let accrue = |last: Option<&BookEvent>, start: Option<DateTime<Utc>>, ts: DateTime<Utc>| {
            match (last, start) {
                (Some(prev), Some(start)) if prev.kind.is_reading() => (ts - start).num_seconds(),
                _ => 0,
            }
        };

        for event in &events {
            let ts = event.timestamp;
            match event.kind {
                EventKind::PickUp => {
                    // A pick-up without a put-down still ends the previous read.
                    if let Some(begun) = first {
                        read_secs += accrue(last, start, ts);
                        let end = match last {
                            Some(prev) if !prev.kind.is_reading() => prev.timestamp,
                            _ => ts,
                        };
                        sessions.push(ReadSession {
                            start: begun,
                            start_position: first_pos,
                            end: Some(end),
                            end_position: latest_pos,
                            read_seconds: read_secs,
                        });
                    }
                    first = Some(ts);
                    start = Some(ts);
                    first_pos = event.position;
                    latest_pos = None;
                    read_secs = 0;
                }
                EventKind::Open => {
                    if first.is_none() {
                        first = start.or(Some(ts));
                    }
                    if first_pos.is_none() && event.position.is_some() {
                        first_pos = event.position;
                        latest_pos = event.position;
                    }
                    start = Some(ts);
                }
                EventKind::Close | EventKind::PutDown => {
                    read_secs += accrue(last, start, ts);
                    if event.position.is_some() {
                        latest_pos = event.position;
                    }
                    if event.kind == EventKind::PutDown {
                        if let Some(begun) = first {
                            sessions.push(ReadSession {
                                start: begun,
                                start_position: first_pos,
                                end: Some(ts),
                                end_position: latest_pos,
                                read_seconds: read_secs,
                            });
                        }
                        first = None;
                        start = None;
                        read_secs = 0;
                    }
                }
            }
            last = Some(event);
        }

        if let Some(begun) = first {
            sessions.push(ReadSession {
                start: begun,
                start_position: first_pos,
                end: None,
                end_position: latest_pos,
                read_seconds: read_secs,
            });
        }
        sessions.into_inner()
    }
}

// ── Session acceptance ────────────────────────────────────────────────────────

/// Accepted sessions, applying the rejection and continuation rules.
struct SessionList<'a> {
    thresholds: &'a Thresholds,
    sessions: Vec<ReadSession>,
}

impl<'a> SessionList<'a> {
    fn new(thresholds: &'a Thresholds) -> Self {
        Self {
            thresholds,
            sessions: Vec::new(),
        }
    }

    fn push(&mut self, read: ReadSession) {
        let forwards = read.is_forwards();
        if read.read_seconds < self.thresholds.min_read_secs {
            return;
        }
        if !forwards && read.read_seconds < self.thresholds.min_reverse_read_secs {
            return;
        }
        let Some(last) = self.sessions.last_mut() else {
            self.sessions.push(read);
            return;
        };

        let continuing = last.end_position == read.start_position
            || last
                .end
                .is_some_and(|end| (read.start - end).num_seconds() < self.thresholds.min_read_secs);
        if continuing && forwards {
            last.start_position = last.start_position.min(read.start_position);
            last.end = read.end;
            last.end_position = read.end_position;
            last.read_seconds += read.read_seconds;
            return;
        }
        self.sessions.push(read);
    }

    fn into_inner(self) -> Vec<ReadSession> {
        self.sessions
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
