//! Power / boot state machine.
//!
//! Durations are always attributed to the state that was active right
//! before a transition, keyed by that state's label.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kindle_core::models::{PowerState, PowerStatus, Transition};
use kindle_core::time_utils::format_log_time;
use tracing::debug;

use crate::classifier::RebootMarker;
use crate::normalizer::LineContext;

/// Tracks the device power state across one file.
#[derive(Debug, Clone, Default)]
pub struct PowerStateTracker {
    current: Option<PowerStatus>,
    transitions: Vec<Transition>,
    durations: BTreeMap<String, i64>,
}

impl PowerStateTracker {
    /// Continue from the state carried over from a previous file.
    pub fn resume(current: Option<PowerStatus>) -> Self {
        Self {
            current,
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<&PowerStatus> {
        self.current.as_ref()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn durations(&self) -> &BTreeMap<String, i64> {
        &self.durations
    }

    /// Assume `NO_DATA` from `ts` when nothing is known yet.
    pub fn start_at(&mut self, ts: DateTime<Utc>) {
        if self.current.is_none() {
            self.current = Some(PowerStatus {
                since: ts,
                state: PowerState::NoData,
            });
        }
    }

    /// Move to `new` at `ts`, or stay in the current state when `new` is
    /// `None` (used to close out duration accounting).
    pub fn transition(&mut self, ts: DateTime<Utc>, new: Option<PowerState>) {
        let Some(current) = self.current.take() else {
            if let Some(state) = new {
                self.transitions.push(Transition {
                    at: ts,
                    state: state.clone(),
                });
                self.current = Some(PowerStatus { since: ts, state });
            }
            return;
        };
        let state = new.unwrap_or_else(|| current.state.clone());
        *self
            .durations
            .entry(current.state.label().to_string())
            .or_insert(0) += (ts - current.since).num_seconds();
        debug!(
            "Power State: {} -> {} @ {}",
            current.state,
            state,
            format_log_time(&ts)
        );
        self.transitions.push(Transition {
            at: ts,
            state: state.clone(),
        });
        self.current = Some(PowerStatus { since: ts, state });
    }

    /// Handle a `State change: from -> to` line.
    ///
    /// A mismatching `from` either corrects the placeholder guessed at the
    /// start of the file, or reveals a missed transition, which is then
    /// synthesised half way between the last transition and now.
    pub fn reported_change(
        &mut self,
        ts: DateTime<Utc>,
        from: &str,
        to: &str,
        file_start: DateTime<Utc>,
        ctx: &LineContext<'_>,
    ) -> bool {
        let Some(current) = self.current.as_mut() else {
            debug!(
                "{} Found state transition ({} -> {}) before first timestamp. Ignoring!",
                ctx, from, to
            );
            return false;
        };
        let from_state = PowerState::from(from);
        if from_state != current.state {
            if current.since == file_start {
                current.state = from_state;
            } else {
                debug!(
                    "{} Unexpected state change from {}, expecting {}! Durations will be inaccurate.",
                    ctx, from, current.state
                );
                let midpoint = current.since + (ts - current.since) / 2;
                self.transition(midpoint, Some(from_state));
            }
        }
        self.transition(ts, Some(PowerState::from(to)));
        true
    }

    /// Handle a reboot marker. Returns `false` when the marker is not
    /// meaningful in the current state and the line should be ignored.
    pub fn reboot_marker(&mut self, ts: DateTime<Utc>, marker: RebootMarker) -> bool {
        let booting = self
            .current
            .as_ref()
            .is_some_and(|status| status.state.is_booting());
        let next = match marker {
            RebootMarker::KernelBanner => PowerState::KernelBoot,
            RebootMarker::InitScripts if booting => PowerState::InitScripts,
            RebootMarker::BootFinished if booting => PowerState::Active,
            _ => return false,
        };
        self.transition(ts, Some(next));
        true
    }

    pub fn into_parts(
        self,
    ) -> (
        Option<PowerStatus>,
        Vec<Transition>,
        BTreeMap<String, i64>,
    ) {
        (self.current, self.transitions, self.durations)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
