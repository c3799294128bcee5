use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── PowerState ────────────────────────────────────────────────────────────────

/// Power / boot state of the device.
///
/// The first four states are inferred by the engine itself; anything else is
/// a label reported verbatim by `powerd` state-change lines.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PowerState {
    NoData,
    KernelBoot,
    InitScripts,
    Active,
    Reported(String),
}

impl PowerState {
    /// The label durations are keyed by.
    pub fn label(&self) -> &str {
        match self {
            PowerState::NoData => "NO_DATA",
            PowerState::KernelBoot => "KERNEL_BOOT",
            PowerState::InitScripts => "INITSCRIPTS",
            PowerState::Active => "ACTIVE",
            PowerState::Reported(s) => s,
        }
    }

    /// `true` while the device is known to be booting.
    pub fn is_booting(&self) -> bool {
        matches!(self, PowerState::KernelBoot | PowerState::InitScripts)
    }
}

impl From<&str> for PowerState {
    fn from(s: &str) -> Self {
        match s {
            "NO_DATA" => PowerState::NoData,
            "KERNEL_BOOT" => PowerState::KernelBoot,
            "INITSCRIPTS" => PowerState::InitScripts,
            "ACTIVE" => PowerState::Active,
            other => PowerState::Reported(other.to_string()),
        }
    }
}

impl From<String> for PowerState {
    fn from(s: String) -> Self {
        PowerState::from(s.as_str())
    }
}

impl From<PowerState> for String {
    fn from(state: PowerState) -> Self {
        state.label().to_string()
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The state the device is in and when it was entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerStatus {
    pub since: DateTime<Utc>,
    pub state: PowerState,
}

/// A single recorded power transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub at: DateTime<Utc>,
    pub state: PowerState,
}

// ── Book events ───────────────────────────────────────────────────────────────

/// Events in a book's life.
///
/// A single book comes off the shelf, is opened and closed while it is read
/// and finally goes back on the shelf. The declaration order is the sort
/// order used when two events share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Picked up off the shelf, implies open.
    PickUp,
    /// Put back on the shelf, implies close.
    PutDown,
    /// Opened to read.
    Open,
    /// Closed for now.
    Close,
}

impl EventKind {
    /// Human-readable label used in event listings.
    pub fn describe(&self) -> &'static str {
        match self {
            EventKind::PickUp => "PICKED UP",
            EventKind::PutDown => "PUT DOWN",
            EventKind::Open => "OPENED",
            EventKind::Close => "CLOSED",
        }
    }

    /// `true` for events after which the book is being read.
    pub fn is_reading(&self) -> bool {
        matches!(self, EventKind::PickUp | EventKind::Open)
    }
}

/// One observed event for a book.
///
/// Field order matters: derived ordering sorts by time, then kind, then
/// position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(default)]
    pub position: Option<u64>,
}

/// A reconstructed reading session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSession {
    /// When the book was picked up.
    pub start: DateTime<Utc>,
    pub start_position: Option<u64>,
    /// When the book was put down; `None` while still in progress.
    pub end: Option<DateTime<Utc>>,
    pub end_position: Option<u64>,
    /// Time actually spent with the book open.
    pub read_seconds: i64,
}

impl ReadSession {
    /// `true` unless the reading appears to have gone backwards.
    pub fn is_forwards(&self) -> bool {
        self.end_position >= self.start_position
    }

    pub fn in_progress(&self) -> bool {
        self.end.is_none()
    }
}

// ── Thresholds ────────────────────────────────────────────────────────────────

/// Tuning constants for timestamp normalisation and session reconstruction.
///
/// The defaults were chosen empirically for one device family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Tolerance when comparing an observed jump with an expected one.
    pub tz_fuzz_secs: i64,
    /// Backward jumps up to this size are accepted as-is.
    pub max_backward_jump_secs: i64,
    /// Forward jumps up to this size are accepted as-is.
    pub max_forward_jump_secs: i64,
    /// Gaps between files beyond this are treated as missing data.
    pub max_file_gap_secs: i64,
    /// Events closer than this are coalesced.
    pub coalesce_secs: i64,
    /// A put-down this soon after a close replaces the close.
    pub put_down_after_close_secs: i64,
    /// Minimum in-hand time for a read to count.
    pub min_read_secs: i64,
    /// Minimum in-hand time when the reading went backwards.
    pub min_reverse_read_secs: i64,
}

pub const DEFAULT_TZ_FUZZ_SECS: i64 = 300;
pub const DEFAULT_MAX_BACKWARD_JUMP_SECS: i64 = 3601;
pub const DEFAULT_MAX_FORWARD_JUMP_SECS: i64 = 3600 * 24 * 120;
pub const DEFAULT_MAX_FILE_GAP_SECS: i64 = 60 * 30;
pub const DEFAULT_COALESCE_SECS: i64 = 1;
pub const DEFAULT_PUT_DOWN_AFTER_CLOSE_SECS: i64 = 15;
pub const DEFAULT_MIN_READ_SECS: i64 = 2 * 60;
pub const DEFAULT_MIN_REVERSE_READ_SECS: i64 = 10 * 60;

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            tz_fuzz_secs: DEFAULT_TZ_FUZZ_SECS,
            max_backward_jump_secs: DEFAULT_MAX_BACKWARD_JUMP_SECS,
            max_forward_jump_secs: DEFAULT_MAX_FORWARD_JUMP_SECS,
            max_file_gap_secs: DEFAULT_MAX_FILE_GAP_SECS,
            coalesce_secs: DEFAULT_COALESCE_SECS,
            put_down_after_close_secs: DEFAULT_PUT_DOWN_AFTER_CLOSE_SECS,
            min_read_secs: DEFAULT_MIN_READ_SECS,
            min_reverse_read_secs: DEFAULT_MIN_REVERSE_READ_SECS,
        }
    }
}

// ── Fuzzy comparisons ─────────────────────────────────────────────────────────

/// `true` if `a` and `b` are within `fuzz` seconds of each other.
pub fn equal_with_fuzz(a: i64, b: i64, fuzz: i64) -> bool {
    a == b || (a - b).abs() < fuzz
}

/// Match `value` against the expected jump `reference`, allowing for a one
/// hour daylight-saving skew in either direction.
///
/// Returns the un-fuzzed jump that matched: `reference` itself for a near
/// exact match, otherwise `reference - 3600` or `reference + 3600`.
///
/// ```
/// use kindle_core::models::match_with_fuzz_by_hour;
///
/// assert_eq!(match_with_fuzz_by_hour(3600, 3600, 300), Some(3600));
/// assert_eq!(match_with_fuzz_by_hour(3600, 3601, 300), Some(3600));
/// assert_eq!(match_with_fuzz_by_hour(3600, 3901, 300), None);
/// assert_eq!(match_with_fuzz_by_hour(3600, 7200, 300), Some(7200));
/// ```
pub fn match_with_fuzz_by_hour(reference: i64, value: i64, fuzz: i64) -> Option<i64> {
    if equal_with_fuzz(reference, value, fuzz) {
        return Some(reference);
    }
    if reference > 3600 && equal_with_fuzz(reference - 3600, value, fuzz) {
        return Some(reference - 3600);
    }
    if equal_with_fuzz(reference + 3600, value, fuzz) {
        return Some(reference + 3600);
    }
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────
