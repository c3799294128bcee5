use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Format a reading duration in seconds as a human-readable string.
///
/// Seconds are rounded into minutes; hours and days are spelled out only
/// when non-zero.
///
/// # Examples
///
/// ```
/// use kindle_core::formatting::format_hms;
///
/// assert_eq!(format_hms(45), "1 min");
/// assert_eq!(format_hms(150), "2 mins");
/// assert_eq!(format_hms(3600), "1 hour, 0 min");
/// assert_eq!(format_hms(2 * 3600 + 5 * 60), "2 hours, 5 mins");
/// assert_eq!(format_hms(86_400 + 60), "1 day, 1 min");
/// ```
pub fn format_hms(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86_400;
    let rest = seconds % 86_400;
    let hms = format_hours_minutes(rest / 3600, (rest % 3600) / 60, rest % 60);
    match days {
        0 => hms,
        1 => format!("1 day, {}", hms),
        n => format!("{} days, {}", n, hms),
    }
}

fn format_hours_minutes(hours: i64, mut minutes: i64, seconds: i64) -> String {
    if seconds > 30 {
        minutes += 1;
    }
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{} hour", hours));
        if hours > 1 {
            out.push('s');
        }
        out.push_str(", ");
    }
    out.push_str(&format!("{} min", minutes));
    if minutes > 1 {
        out.push('s');
    }
    out
}

/// Format an instant in `tz` in the classic `ctime` layout,
/// e.g. `"Thu Mar 15 14:25:01 2012"`.
pub fn format_ctime(dt: &DateTime<Utc>, tz: &Tz) -> String {
    dt.with_timezone(tz).format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Render the end of a read, or the in-progress marker.
pub fn format_read_end(end: Option<&DateTime<Utc>>, tz: &Tz) -> String {
    match end {
        Some(dt) => format_ctime(dt, tz),
        None => "In Progress!".to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
