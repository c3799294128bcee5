use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::KindleError;

/// Zone the device logs in until told otherwise.
pub const DEFAULT_DEVICE_TIMEZONE: &str = "Europe/Dublin";

/// Layout of the timestamp token at the start of every log line.
pub const LOG_TIMESTAMP_FORMAT: &str = "%y%m%d:%H%M%S";

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── DeviceZone ────────────────────────────────────────────────────────────────

/// The zone a device's local timestamps are interpreted in.
///
/// Zone names the tz database does not know are kept as a fixed offset.
/// Serialises as the zone name, or `UTC+HH:MM` for fixed offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DeviceZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl Default for DeviceZone {
    fn default() -> Self {
        DeviceZone::Named(chrono_tz::Europe::Dublin)
    }
}

impl DeviceZone {
    /// Parse an IANA zone name.
    pub fn named(name: &str) -> Result<Self, KindleError> {
        name.parse::<Tz>()
            .map(DeviceZone::Named)
            .map_err(|_| KindleError::InvalidTimezone(name.to_string()))
    }

    /// A fixed zone `offset_secs` east of UTC.
    pub fn fixed(offset_secs: i32) -> Result<Self, KindleError> {
        FixedOffset::east_opt(offset_secs)
            .map(DeviceZone::Fixed)
            .ok_or_else(|| KindleError::InvalidTimezone(format!("offset {offset_secs}")))
    }

    /// Interpret a device-local wall-clock time in this zone.
    ///
    /// Ambiguous times resolve to the later instant; times skipped by a
    /// transition use the offset in effect before it. Instants before the
    /// epoch clamp to the epoch.
    pub fn localize(&self, naive: &NaiveDateTime) -> DateTime<Utc> {
        let dt = match self {
            DeviceZone::Named(tz) => resolve_local(tz, naive),
            DeviceZone::Fixed(offset) => resolve_local(offset, naive),
        };
        if dt.timestamp() < 0 {
            return DateTime::<Utc>::default();
        }
        dt
    }

    /// Offset from UTC, in seconds, of the wall-clock time `naive`.
    pub fn offset_secs_at(&self, naive: &NaiveDateTime) -> i64 {
        let dt = match self {
            DeviceZone::Named(tz) => resolve_local(tz, naive),
            DeviceZone::Fixed(offset) => resolve_local(offset, naive),
        };
        (Utc.from_utc_datetime(naive) - dt).num_seconds()
    }
}

fn resolve_local<T: TimeZone>(tz: &T, naive: &NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(_, later) => later.with_timezone(&Utc),
        LocalResult::None => {
            let before = *naive - TimeDelta::hours(1);
            match tz.from_local_datetime(&before) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(_, dt) => {
                    dt.with_timezone(&Utc) + TimeDelta::hours(1)
                }
                LocalResult::None => Utc.from_utc_datetime(naive),
            }
        }
    }
}

impl std::fmt::Display for DeviceZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceZone::Named(tz) => f.write_str(tz.name()),
            DeviceZone::Fixed(offset) => write!(f, "UTC{offset}"),
        }
    }
}

impl From<DeviceZone> for String {
    fn from(zone: DeviceZone) -> Self {
        zone.to_string()
    }
}

impl TryFrom<String> for DeviceZone {
    type Error = KindleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for DeviceZone {
    type Err = KindleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(offset) = s.strip_prefix("UTC").filter(|rest| !rest.is_empty()) {
            return parse_utc_offset(offset)
                .and_then(FixedOffset::east_opt)
                .map(DeviceZone::Fixed)
                .ok_or_else(|| KindleError::InvalidTimezone(s.to_string()));
        }
        DeviceZone::named(s)
    }
}

/// Parse `+HH:MM[:SS]` / `-HH:MM[:SS]` into seconds.
fn parse_utc_offset(s: &str) -> Option<i32> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let mut parts = rest.split(':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = parts.next()?.parse().ok()?;
    let seconds: i32 = match parts.next() {
        Some(secs) => secs.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60 + seconds))
}

// ── Log timestamps ────────────────────────────────────────────────────────────

/// Extract the `YYMMDD:HHMMSS` token at the very start of `line`.
///
/// Returns `None` when the line does not start with a well-formed token.
pub fn parse_log_timestamp(line: &str) -> Option<NaiveDateTime> {
    let token = line.get(..13)?;
    let bytes = token.as_bytes();
    let well_formed = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| if i == 6 { *b == b':' } else { b.is_ascii_digit() });
    if !well_formed {
        return None;
    }
    NaiveDateTime::parse_from_str(token, LOG_TIMESTAMP_FORMAT).ok()
}

/// Render a UTC instant the way diagnostics print it.
pub fn format_log_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d-%H:%M:%S").to_string()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
