//! Rotated log file discovery.
//!
//! The device rotates its log into `messages_<sequence>_<datestamp>` files.
//! A later datestamp for the same sequence number is a newer, more complete
//! copy of the same log.

use std::path::{Path, PathBuf};

use tracing::warn;

/// File name prefix of rotated device logs.
pub const LOG_PREFIX: &str = "messages_";

// ── Public API ────────────────────────────────────────────────────────────────

/// A parsed rotated log file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedName {
    pub name: String,
    pub sequence: String,
    pub datestamp: String,
}

impl RotatedName {
    /// Parse `messages_<sequence>_<datestamp>`; `None` for anything else.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(LOG_PREFIX)?;
        let (sequence, datestamp) = rest.split_once('_')?;
        if sequence.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            sequence: sequence.to_string(),
            datestamp: datestamp.to_string(),
        })
    }

    /// `true` when `self` is a newer copy of the log `other` names.
    pub fn supersedes(&self, other: &RotatedName) -> bool {
        self.sequence == other.sequence && self.datestamp > other.datestamp
    }
}

/// Find rotated log files directly inside `dir`, sorted by file name.
///
/// Names with the log prefix that do not follow the rotation convention are
/// skipped with a warning.
pub fn find_log_files(dir: &Path) -> Vec<(RotatedName, PathBuf)> {
    if !dir.is_dir() {
        warn!("Log directory does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<(RotatedName, PathBuf)> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(LOG_PREFIX) {
                return None;
            }
            match RotatedName::parse(&name) {
                Some(rotated) => Some((rotated, entry.into_path())),
                None => {
                    warn!("Skipping log with unexpected name: {}", name);
                    None
                }
            }
        })
        .collect();

    files.sort_by(|a, b| a.0.name.cmp(&b.0.name));
    files
}

// ── Tests ─────────────────────────────────────────────────────────────────────
