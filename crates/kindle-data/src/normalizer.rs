//! Timestamp normalisation.
//!
//! Device timestamps are local wall-clock times from a clock that drifts,
//! resets on reboot and changes zone. The normaliser only ever sees the
//! effect of those discontinuities (large deltas between consecutive lines)
//! and maps raw timestamps onto a corrected, monotonic-ish timeline.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use kindle_core::error::{KindleError, Result};
use kindle_core::models::{match_with_fuzz_by_hour, Thresholds};
use kindle_core::time_utils::{format_log_time, DeviceZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ── State ─────────────────────────────────────────────────────────────────────

/// A timezone switch: the jump in seconds it causes and the zone involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneJump {
    pub jump_secs: i64,
    pub zone: DeviceZone,
}

/// Anchor for correcting timestamps after an unexplained clock jump.
///
/// Raw times are corrected as `real + (raw - bad)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    /// The last good corrected time before the jump.
    pub real: DateTime<Utc>,
    /// The first bad raw time after the jump.
    pub bad: DateTime<Utc>,
}

/// Correction state threaded through every line of every file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    /// Corrected timestamp of the last accepted line.
    pub last_ts: Option<DateTime<Utc>>,
    /// Zone raw timestamps are currently interpreted in.
    pub timezone: DeviceZone,
    /// A zone change that has been announced but not yet observed.
    pub pending: Option<ZoneJump>,
    /// The last applied zone change, used to fix up stragglers.
    pub previous: Option<ZoneJump>,
    /// Active jump correction, if any.
    pub baseline: Option<Baseline>,
}

impl ClockState {
    pub fn new(timezone: DeviceZone) -> Self {
        Self {
            timezone,
            ..Self::default()
        }
    }
}

// ── Diagnostics context ───────────────────────────────────────────────────────

/// Where in the corpus a line came from; prefixes every per-line message.
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    pub file: &'a str,
    pub line: usize,
}

impl std::fmt::Display for LineContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.line, log_name(self.file))
    }
}

/// Short display name of a rotated log file, e.g. `messages_00042_x` → `42_x`.
pub fn log_name(file: &str) -> &str {
    file.trim_start_matches(|c| "mesag_".contains(c))
        .trim_start_matches('0')
}

// ── Results ───────────────────────────────────────────────────────────────────

/// What the normaliser concluded about a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpOutcome {
    /// No discontinuity; any active baseline was applied.
    Steady,
    /// The announced zone change happened on this line.
    TimezoneSwitched,
    /// The line was still logged in the zone just left.
    Straggler,
    /// First line of a file long after the previous file ended.
    FileGap { since: DateTime<Utc> },
    /// An unexplained jump started a new baseline.
    BaselineStarted,
    /// The clock came back to reality; the baseline was dropped.
    BaselineCleared,
    /// A further jump while a baseline was active re-anchored it.
    BaselineRebased,
}

/// The corrected time of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    pub raw: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub outcome: JumpOutcome,
}

impl Correction {
    fn new(raw: DateTime<Utc>, timestamp: DateTime<Utc>, outcome: JumpOutcome) -> Self {
        Self {
            raw,
            timestamp,
            outcome,
        }
    }

    /// Seconds added to the raw timestamp.
    pub fn correction_secs(&self) -> i64 {
        (self.timestamp - self.raw).num_seconds()
    }
}

impl std::fmt::Display for Correction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:+})",
            format_log_time(&self.timestamp),
            self.correction_secs()
        )
    }
}

// ── TimeNormalizer ────────────────────────────────────────────────────────────

/// Corrects raw line timestamps for zone changes and clock jumps.
#[derive(Debug, Clone, Default)]
pub struct TimeNormalizer {
    thresholds: Thresholds,
}

impl TimeNormalizer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Interpret a raw wall-clock timestamp in the currently active zone.
    pub fn localize(&self, state: &ClockState, naive: &NaiveDateTime) -> DateTime<Utc> {
        state.timezone.localize(naive)
    }

    /// Correct `raw`, the localised timestamp of the current line.
    ///
    /// `first_in_file` enables detection of gaps between files. The caller
    /// stores the returned timestamp in `state.last_ts` once the line has
    /// been accepted.
    pub fn normalize(
        &self,
        state: &mut ClockState,
        raw: DateTime<Utc>,
        first_in_file: bool,
        ctx: &LineContext<'_>,
    ) -> Result<Correction> {
        let Some(last_corrected) = state.last_ts else {
            return Ok(Correction::new(raw, raw, JumpOutcome::Steady));
        };

        // Compare against the last line in raw clock terms.
        let last_raw = match state.baseline {
            Some(baseline) => {
                let diff = last_corrected - baseline.real;
                if diff < TimeDelta::zero() {
                    return Err(clock_error(
                        ctx,
                        baseline.real,
                        last_corrected,
                        "last timestamp precedes the jump baseline".to_string(),
                    ));
                }
                baseline.bad + diff
            }
            None => last_corrected,
        };
        let jump = (raw - last_raw).num_seconds();
        let fuzz = self.thresholds.tz_fuzz_secs;

        if let Some(pending) = state.pending.filter(|p| p.jump_secs != 0) {
            if match_with_fuzz_by_hour(pending.jump_secs, jump, fuzz).is_some() {
                let ts = self.calculate(state, raw, ctx)? - TimeDelta::seconds(pending.jump_secs);
                let old_zone = state.timezone;
                state.previous = Some(ZoneJump {
                    jump_secs: -pending.jump_secs,
                    zone: old_zone,
                });
                state.timezone = pending.zone;
                state.pending = None;
                info!(
                    "{} New timezone {} activated. (time would be {} as {})",
                    ctx,
                    state.timezone,
                    format_log_time(&raw),
                    old_zone
                );
                return Ok(Correction::new(raw, ts, JumpOutcome::TimezoneSwitched));
            }
        }

        if let Some(previous) = state.previous.filter(|p| p.jump_secs != 0) {
            if let Some(offset) = match_with_fuzz_by_hour(previous.jump_secs, jump, fuzz) {
                let ts = self.calculate(state, raw, ctx)? - TimeDelta::seconds(offset);
                debug!(
                    "{} Line had old timezone +/-1 hr (would have been {} as {} ({})).",
                    ctx,
                    format_log_time(&raw),
                    previous.zone,
                    previous.jump_secs
                );
                return Ok(Correction::new(raw, ts, JumpOutcome::Straggler));
            }
        }

        if first_in_file && jump > self.thresholds.max_file_gap_secs {
            warn!(
                "{} Missing data from {} till now. Resetting state.",
                ctx,
                format_log_time(&last_raw)
            );
            return Ok(Correction::new(
                raw,
                raw,
                JumpOutcome::FileGap { since: last_raw },
            ));
        }

        if jump < 0 && jump.abs() > self.thresholds.max_backward_jump_secs {
            debug!(
                "{} Large jump backwards from {} ({})",
                ctx,
                format_log_time(&last_raw),
                jump
            );
            return self.handle_jump(state, raw, last_raw, last_corrected, ctx);
        }
        if jump > self.thresholds.max_forward_jump_secs {
            debug!(
                "{} Large jump forwards from {} ({})",
                ctx,
                format_log_time(&last_raw),
                jump
            );
            return self.handle_jump(state, raw, last_raw, last_corrected, ctx);
        }

        let ts = self.calculate(state, raw, ctx)?;
        Ok(Correction::new(raw, ts, JumpOutcome::Steady))
    }

    /// Record an announced timezone change.
    ///
    /// The switch itself is deferred until the matching jump shows up in
    /// the timestamps, since the change is logged a little before lines
    /// start arriving in the new zone. Returns the expected jump, or `None`
    /// when the announcement could not be understood.
    pub fn expect_timezone_change(
        &self,
        state: &mut ClockState,
        offset: &str,
        zone_name: &str,
        now: DateTime<Utc>,
        ctx: &LineContext<'_>,
    ) -> Option<i64> {
        let zone = match DeviceZone::named(zone_name) {
            Ok(zone) => zone,
            Err(_) => {
                debug!("{} Timezone change to unknown zone {} detected", ctx, zone_name);
                let secs = match offset.trim().parse::<i32>() {
                    Ok(secs) => secs,
                    Err(e) => {
                        warn!("{} Could not parse timezone offset '{}': {}", ctx, offset, e);
                        return None;
                    }
                };
                // Fixed zones are whole minutes.
                match DeviceZone::fixed(secs.div_euclid(60) * 60) {
                    Ok(zone) => zone,
                    Err(e) => {
                        warn!("{} {}", ctx, e);
                        return None;
                    }
                }
            }
        };

        let at = now.naive_utc();
        let jump = zone.offset_secs_at(&at) - state.timezone.offset_secs_at(&at);
        state.pending = Some(ZoneJump {
            jump_secs: jump,
            zone,
        });
        debug!(
            "{} New timezone {}/{}, waiting for {} seconds jump from {}",
            ctx, zone_name, offset, jump, state.timezone
        );
        Some(jump)
    }

    // ── Private helpers ───────────────────────────────────────────────────

    /// An unexplained jump: start, clear or re-anchor the baseline.
    fn handle_jump(
        &self,
        state: &mut ClockState,
        raw: DateTime<Utc>,
        last_raw: DateTime<Utc>,
        last_corrected: DateTime<Utc>,
        ctx: &LineContext<'_>,
    ) -> Result<Correction> {
        let Some(baseline) = state.baseline else {
            state.baseline = Some(Baseline {
                real: last_corrected,
                bad: raw,
            });
            let ts = self.calculate(state, raw, ctx)?;
            debug!(
                "{} New jump offsets. real={}, bad={}",
                ctx,
                format_log_time(&last_corrected),
                format_log_time(&raw)
            );
            return Ok(Correction::new(raw, ts, JumpOutcome::BaselineStarted));
        };

        let since_real = (raw - baseline.real).num_seconds();
        if (0..=self.thresholds.max_forward_jump_secs).contains(&since_real) {
            info!(
                "{} Jump from {} brings us back to reality",
                ctx,
                format_log_time(&last_raw)
            );
            state.baseline = None;
            return Ok(Correction::new(raw, raw, JumpOutcome::BaselineCleared));
        }

        // Still not back in reality: the new raw time becomes the bad time,
        // the corrected time of the previous line the real one.
        let rebased = self.calculate(state, last_raw, ctx)?;
        debug!(
            "{} Second jump ({} -> {}). Reset jump offsets ({}, {}) -> ({}, {})",
            ctx,
            format_log_time(&last_raw),
            format_log_time(&raw),
            format_log_time(&baseline.real),
            format_log_time(&baseline.bad),
            format_log_time(&rebased),
            format_log_time(&raw)
        );
        state.baseline = Some(Baseline {
            real: rebased,
            bad: raw,
        });
        Ok(Correction::new(raw, rebased, JumpOutcome::BaselineRebased))
    }

    /// Apply the active baseline, if any, to a raw timestamp.
    fn calculate(
        &self,
        state: &ClockState,
        ts: DateTime<Utc>,
        ctx: &LineContext<'_>,
    ) -> Result<DateTime<Utc>> {
        let Some(baseline) = state.baseline else {
            return Ok(ts);
        };
        let diff = ts - baseline.bad;
        let calculated = baseline.real + diff;
        if diff.num_seconds() > self.thresholds.max_forward_jump_secs {
            return Err(clock_error(
                ctx,
                baseline.real,
                calculated,
                format!(
                    "jump is too large ({} > {})",
                    diff.num_seconds(),
                    self.thresholds.max_forward_jump_secs
                ),
            ));
        }
        Ok(calculated)
    }
}

fn clock_error(
    ctx: &LineContext<'_>,
    previous: DateTime<Utc>,
    current: DateTime<Utc>,
    detail: String,
) -> KindleError {
    KindleError::ClockModel {
        file: ctx.file.to_string(),
        line: ctx.line,
        previous,
        current,
        detail,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    const CTX: LineContext<'static> = LineContext {
        file: "messages_00007_20120110",
        line: 1,
    };

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    /// Feed one line through the normaliser the way the file processor does.
    fn step(
        normalizer: &TimeNormalizer,
        state: &mut ClockState,
        local: NaiveDateTime,
    ) -> Correction {
        let raw = normalizer.localize(state, &local);
        let c = normalizer.normalize(state, raw, false, &CTX).unwrap();
        state.last_ts = Some(c.timestamp);
        c
    }

    fn dublin() -> ClockState {
        ClockState::new(DeviceZone::default())
    }

    // ── Basics ────────────────────────────────────────────────────────────────

    #[test]
    fn test_first_line_is_taken_as_is() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        let c = step(&n, &mut state, naive(2012, 1, 10, 12, 0, 0));
        assert_eq!(c.timestamp, utc(2012, 1, 10, 12, 0, 0));
        assert_eq!(c.outcome, JumpOutcome::Steady);
        assert_eq!(c.correction_secs(), 0);
    }

    #[test]
    fn test_small_backward_jump_is_tolerated() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        step(&n, &mut state, naive(2012, 1, 10, 12, 0, 0));
        let c = step(&n, &mut state, naive(2012, 1, 10, 11, 30, 0));
        assert_eq!(c.outcome, JumpOutcome::Steady);
        assert_eq!(c.timestamp, utc(2012, 1, 10, 11, 30, 0));
        assert!(state.baseline.is_none());
    }

    #[test]
    fn test_file_gap_detected_on_first_line() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        state.last_ts = Some(utc(2012, 1, 10, 12, 0, 0));
        let raw = utc(2012, 1, 10, 14, 0, 0);
        let c = n.normalize(&mut state, raw, true, &CTX).unwrap();
        assert_eq!(
            c.outcome,
            JumpOutcome::FileGap {
                since: utc(2012, 1, 10, 12, 0, 0)
            }
        );
        assert_eq!(c.timestamp, raw);

        // The same delta mid-file is just time passing.
        let c = n.normalize(&mut state, raw, false, &CTX).unwrap();
        assert_eq!(c.outcome, JumpOutcome::Steady);
    }

    // ── Timezone changes ──────────────────────────────────────────────────────

    #[test]
    fn test_timezone_switch_then_straggler() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        step(&n, &mut state, naive(2012, 1, 10, 12, 0, 0));

        let expected = n.expect_timezone_change(
            &mut state,
            "-18000",
            "America/New_York",
            utc(2012, 1, 10, 12, 0, 0),
            &CTX,
        );
        assert_eq!(expected, Some(-18000));
        assert_eq!(state.timezone, DeviceZone::default());

        // Device now logs New York local time, still parsed as Dublin.
        let c = step(&n, &mut state, naive(2012, 1, 10, 7, 1, 0));
        assert_eq!(c.outcome, JumpOutcome::TimezoneSwitched);
        assert_eq!(c.timestamp, utc(2012, 1, 10, 12, 1, 0));
        assert_eq!(state.timezone.to_string(), "America/New_York");
        assert!(state.pending.is_none());
        assert_eq!(state.previous.map(|p| p.jump_secs), Some(18000));

        // A line still in Dublin time, now parsed as New York.
        let c = step(&n, &mut state, naive(2012, 1, 10, 12, 2, 0));
        assert_eq!(c.outcome, JumpOutcome::Straggler);
        assert_eq!(c.timestamp, utc(2012, 1, 10, 12, 2, 0));
        assert_eq!(state.timezone.to_string(), "America/New_York");

        // Regular New York lines need no correction.
        let c = step(&n, &mut state, naive(2012, 1, 10, 7, 3, 0));
        assert_eq!(c.outcome, JumpOutcome::Steady);
        assert_eq!(c.timestamp, utc(2012, 1, 10, 12, 3, 0));
    }

    #[test]
    fn test_straggler_an_hour_off_is_corrected() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        step(&n, &mut state, naive(2012, 1, 10, 12, 0, 0));
        n.expect_timezone_change(&mut state, "-18000", "America/New_York", utc(2012, 1, 10, 12, 0, 0), &CTX);
        step(&n, &mut state, naive(2012, 1, 10, 7, 1, 0));

        // Logged an hour ahead of the old zone, parsed as New York.
        let c = step(&n, &mut state, naive(2012, 1, 10, 13, 2, 0));
        assert_eq!(c.outcome, JumpOutcome::Straggler);
        assert_eq!(c.correction_secs(), -21600);
        assert_eq!(c.timestamp, utc(2012, 1, 10, 12, 2, 0));
        assert_eq!(state.timezone.to_string(), "America/New_York");
        assert_eq!(state.previous.map(|p| p.jump_secs), Some(18000));
    }

    #[test]
    fn test_timezone_switch_absorbs_dst_hour() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        step(&n, &mut state, naive(2012, 1, 10, 12, 0, 0));
        n.expect_timezone_change(&mut state, "-18000", "America/New_York", utc(2012, 1, 10, 12, 0, 0), &CTX);

        // Off by an hour: still recognised as the announced switch.
        let c = step(&n, &mut state, naive(2012, 1, 10, 8, 0, 0));
        assert_eq!(c.outcome, JumpOutcome::TimezoneSwitched);
    }

    #[test]
    fn test_unknown_zone_falls_back_to_fixed_offset() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        let jump = n.expect_timezone_change(&mut state, "7200", "Nowhere/Special", utc(2012, 1, 10, 12, 0, 0), &CTX);
        assert_eq!(jump, Some(7200));
        assert_eq!(state.pending.map(|p| p.zone.to_string()).as_deref(), Some("UTC+02:00"));
    }

    #[test]
    fn test_unknown_zone_offset_floors_to_minutes() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        let jump = n.expect_timezone_change(&mut state, "5430", "Nowhere/Special", utc(2012, 1, 10, 12, 0, 0), &CTX);
        assert_eq!(jump, Some(5400));
        assert_eq!(state.pending.map(|p| p.zone), Some(DeviceZone::fixed(5400).unwrap()));

        let jump = n.expect_timezone_change(&mut state, "-5430", "Nowhere/Special", utc(2012, 1, 10, 12, 0, 0), &CTX);
        assert_eq!(jump, Some(-5460));
    }

    #[test]
    fn test_unparseable_offset_for_unknown_zone_is_ignored() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        let jump = n.expect_timezone_change(&mut state, "abc", "Nowhere/Special", utc(2012, 1, 10, 12, 0, 0), &CTX);
        assert!(jump.is_none());
        assert!(state.pending.is_none());
    }

    // ── Clock jumps ───────────────────────────────────────────────────────────

    #[test]
    fn test_baseline_established_and_cleared() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        step(&n, &mut state, naive(2012, 6, 1, 12, 0, 0));
        let last_good = state.last_ts.unwrap();

        // Clock reset to years ago.
        let c = step(&n, &mut state, naive(2010, 1, 1, 0, 0, 0));
        assert_eq!(c.outcome, JumpOutcome::BaselineStarted);
        assert_eq!(c.timestamp, last_good);
        assert!(state.baseline.is_some());

        // Time keeps flowing relative to the baseline.
        let c = step(&n, &mut state, naive(2010, 1, 1, 0, 5, 0));
        assert_eq!(c.outcome, JumpOutcome::Steady);
        assert_eq!(c.timestamp, last_good + TimeDelta::seconds(300));

        // Clock fixed: back to reality.
        let c = step(&n, &mut state, naive(2012, 6, 1, 12, 10, 0));
        assert_eq!(c.outcome, JumpOutcome::BaselineCleared);
        assert!(state.baseline.is_none());
        assert_eq!(c.timestamp, c.raw);

        let c = step(&n, &mut state, naive(2012, 6, 1, 12, 11, 0));
        assert_eq!(c.timestamp, c.raw);
        assert_eq!(c.outcome, JumpOutcome::Steady);
    }

    #[test]
    fn test_second_jump_rebases() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        step(&n, &mut state, naive(2012, 6, 1, 12, 0, 0));
        step(&n, &mut state, naive(2010, 1, 1, 0, 0, 0));
        let before = step(&n, &mut state, naive(2010, 1, 1, 0, 10, 0)).timestamp;

        // Jumps back again, further into the past.
        let c = step(&n, &mut state, naive(2008, 1, 1, 0, 0, 0));
        assert_eq!(c.outcome, JumpOutcome::BaselineRebased);
        assert_eq!(c.timestamp, before);
        assert_eq!(
            state.baseline,
            Some(Baseline {
                real: before,
                bad: utc(2008, 1, 1, 0, 0, 0)
            })
        );

        let c = step(&n, &mut state, naive(2008, 1, 1, 0, 1, 0));
        assert_eq!(c.timestamp, before + TimeDelta::seconds(60));
    }

    #[test]
    fn test_forward_jump_beyond_ceiling_starts_baseline() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        step(&n, &mut state, naive(2012, 1, 1, 12, 0, 0));
        let c = step(&n, &mut state, naive(2030, 1, 1, 12, 0, 0));
        assert_eq!(c.outcome, JumpOutcome::BaselineStarted);
        assert_eq!(c.timestamp, utc(2012, 1, 1, 12, 0, 0));
    }

    #[test]
    fn test_runaway_baseline_is_fatal() {
        let n = TimeNormalizer::default();
        let real = utc(2012, 1, 1, 0, 0, 0);
        let bad = utc(2010, 1, 1, 0, 0, 0);
        let mut state = dublin();
        state.baseline = Some(Baseline { real, bad });
        state.last_ts = Some(real + TimeDelta::days(100));

        // Only 30 days after the last line, but 130 days past the jump.
        let raw = bad + TimeDelta::days(130);
        let err = n.normalize(&mut state, raw, false, &CTX).unwrap_err();
        match err {
            KindleError::ClockModel { file, line, previous, current, detail } => {
                assert_eq!(file, "messages_00007_20120110");
                assert_eq!(line, 1);
                assert_eq!(previous, real);
                assert_eq!(current, real + TimeDelta::days(130));
                assert!(detail.contains("jump is too large"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_last_before_baseline_is_fatal() {
        let n = TimeNormalizer::default();
        let mut state = dublin();
        state.baseline = Some(Baseline {
            real: utc(2012, 1, 2, 0, 0, 0),
            bad: utc(2010, 1, 1, 0, 0, 0),
        });
        state.last_ts = Some(utc(2012, 1, 1, 0, 0, 0));
        let err = n
            .normalize(&mut state, utc(2010, 1, 1, 0, 0, 5), false, &CTX)
            .unwrap_err();
        assert!(!err.is_file_fatal());
    }

    // ── Context ───────────────────────────────────────────────────────────────

    #[test]
    fn test_correction_display() {
        let c = Correction::new(
            utc(2012, 1, 10, 12, 0, 0),
            utc(2012, 1, 10, 13, 0, 0),
            JumpOutcome::Steady,
        );
        assert_eq!(c.to_string(), "2012-01-10-13:00:00 (+3600)");
    }

    #[test]
    fn test_log_name_and_context_prefix() {
        assert_eq!(log_name("messages_00042_20120101"), "42_20120101");
        assert_eq!(CTX.to_string(), "1@7_20120110");
    }

    #[test]
    fn test_clock_state_round_trips_through_json() {
        let mut state = dublin();
        state.last_ts = Some(utc(2012, 1, 1, 0, 0, 0));
        state.previous = Some(ZoneJump {
            jump_secs: 3600,
            zone: DeviceZone::fixed(3600).unwrap(),
        });
        state.baseline = Some(Baseline {
            real: utc(2012, 1, 1, 0, 0, 0),
            bad: utc(2010, 1, 1, 0, 0, 0),
        });
        let json = serde_json::to_string(&state).unwrap();
        let back: ClockState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
