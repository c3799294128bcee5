use clap::Parser;
use std::path::PathBuf;

use crate::error::{KindleError, Result};
use crate::models::Thresholds;
use crate::time_utils::{DeviceZone, DEFAULT_DEVICE_TIMEZONE};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Reading and power statistics from Kindle device logs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "kindle-stats",
    about = "Reading and power statistics from Kindle device logs",
    version
)]
pub struct Settings {
    /// A directory of rotated logs, a single log file, or an ordered list of log files
    #[arg(required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// Path to file to load/store state from (default: ~/.kindle-utils.state)
    #[arg(short = 's', long)]
    pub state_file: Option<PathBuf>,

    /// Neither load nor store any state
    #[arg(long)]
    pub no_state: bool,

    /// ASIN of specific book to view, with its raw events
    #[arg(short = 'B', long)]
    pub book: Option<String>,

    /// JSON file mapping ASIN to metadata fields (title, creator, ...)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Timezone used to display times (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Timezone the device logs in before any timezone change is seen
    #[arg(long, default_value = DEFAULT_DEVICE_TIMEZONE)]
    pub device_timezone: String,

    /// Tolerance in seconds when matching timezone jumps
    #[arg(long)]
    pub tz_fuzz_secs: Option<i64>,

    /// Largest backward clock jump in seconds accepted without correction
    #[arg(long)]
    pub max_backward_jump_secs: Option<i64>,

    /// Largest forward clock jump in days accepted without correction
    #[arg(long)]
    pub max_forward_jump_days: Option<i64>,

    /// Largest gap in seconds between files before data is assumed missing
    #[arg(long)]
    pub max_file_gap_secs: Option<i64>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and resolve `"auto"` values.
    pub fn load() -> Self {
        Self::resolve_auto_values(Settings::parse())
    }

    /// Same as [`Settings::load`] but accepts an explicit argument list.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Self {
        Self::resolve_auto_values(Settings::parse_from(args))
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Default checkpoint location, `~/.kindle-utils.state`.
    pub fn default_state_file() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kindle-utils.state")
    }

    /// Checkpoint path for a run.
    ///
    /// Directory runs resume from the default location unless told
    /// otherwise; file runs only use a checkpoint named explicitly.
    pub fn state_path(&self, directory_mode: bool) -> Option<PathBuf> {
        if self.no_state {
            return None;
        }
        match (&self.state_file, directory_mode) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => Some(Self::default_state_file()),
            (None, false) => None,
        }
    }

    /// Normalisation and session thresholds with CLI overrides applied.
    pub fn thresholds(&self) -> Result<Thresholds> {
        let mut thresholds = Thresholds::default();
        if let Some(v) = self.tz_fuzz_secs {
            thresholds.tz_fuzz_secs = non_negative("tz-fuzz-secs", v)?;
        }
        if let Some(v) = self.max_backward_jump_secs {
            thresholds.max_backward_jump_secs = non_negative("max-backward-jump-secs", v)?;
        }
        if let Some(v) = self.max_forward_jump_days {
            thresholds.max_forward_jump_secs =
                non_negative("max-forward-jump-days", v)? * 24 * 3600;
        }
        if let Some(v) = self.max_file_gap_secs {
            thresholds.max_file_gap_secs = non_negative("max-file-gap-secs", v)?;
        }
        Ok(thresholds)
    }

    /// The zone the device is assumed to log in initially.
    pub fn device_zone(&self) -> Result<DeviceZone> {
        self.device_timezone.parse()
    }

    /// The zone used for displaying times, falling back to UTC.
    pub fn display_zone(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "unrecognised display timezone \"{}\", falling back to UTC",
                self.timezone
            );
            chrono_tz::Tz::UTC
        })
    }
}

fn non_negative(name: &str, value: i64) -> Result<i64> {
    if value < 0 {
        return Err(KindleError::Config(format!("--{} must not be negative", name)));
    }
    Ok(value)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<std::ffi::OsString> {
        std::iter::once("kindle-stats")
            .chain(list.iter().copied())
            .map(Into::into)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_from_args(args(&["/logs"]));
        assert_eq!(settings.paths, vec![PathBuf::from("/logs")]);
        assert_eq!(settings.log_level, "INFO");
        assert_ne!(settings.timezone, "auto");
        assert_eq!(settings.device_timezone, "Europe/Dublin");
        assert_eq!(settings.thresholds().unwrap(), Thresholds::default());
    }

    #[test]
    fn test_debug_overrides_log_level() {
        let settings = Settings::load_from_args(args(&["-v", "/logs"]));
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_explicit_timezone_is_kept() {
        let settings = Settings::load_from_args(args(&["--timezone", "Asia/Tokyo", "/logs"]));
        assert_eq!(settings.timezone, "Asia/Tokyo");
        assert_eq!(settings.display_zone(), chrono_tz::Asia::Tokyo);
    }

    #[test]
    fn test_invalid_display_timezone_falls_back_to_utc() {
        let settings = Settings::load_from_args(args(&["--timezone", "Mars/Base", "/logs"]));
        assert_eq!(settings.display_zone(), chrono_tz::Tz::UTC);
    }

    #[test]
    fn test_threshold_overrides() {
        let settings = Settings::load_from_args(args(&[
            "--tz-fuzz-secs",
            "60",
            "--max-forward-jump-days",
            "30",
            "--max-file-gap-secs",
            "600",
            "/logs",
        ]));
        let t = settings.thresholds().unwrap();
        assert_eq!(t.tz_fuzz_secs, 60);
        assert_eq!(t.max_forward_jump_secs, 30 * 24 * 3600);
        assert_eq!(t.max_file_gap_secs, 600);
        assert_eq!(t.max_backward_jump_secs, 3601);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let settings =
            Settings::load_from_args(args(&["--max-backward-jump-secs=-5", "/logs"]));
        assert!(matches!(settings.thresholds(), Err(KindleError::Config(_))));
    }

    #[test]
    fn test_state_path_by_mode() {
        let settings = Settings::load_from_args(args(&["/logs"]));
        assert_eq!(
            settings.state_path(true),
            Some(Settings::default_state_file())
        );
        assert_eq!(settings.state_path(false), None);

        let explicit = Settings::load_from_args(args(&["-s", "/tmp/k.state", "a", "b"]));
        assert_eq!(explicit.state_path(false), Some(PathBuf::from("/tmp/k.state")));

        let disabled = Settings::load_from_args(args(&["--no-state", "-s", "/tmp/k", "/logs"]));
        assert_eq!(disabled.state_path(true), None);
    }

    #[test]
    fn test_device_zone() {
        let settings = Settings::load_from_args(args(&["--device-timezone", "UTC+02:00", "/logs"]));
        assert_eq!(settings.device_zone().unwrap().to_string(), "UTC+02:00");
        let bad = Settings::load_from_args(args(&["--device-timezone", "Nowhere", "/logs"]));
        assert!(bad.device_zone().is_err());
    }
}
