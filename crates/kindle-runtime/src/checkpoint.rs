//! Persisted processing state.
//!
//! A checkpoint lets the next run resume where this one stopped: it holds
//! the state carried out of the last processed file and every per-file
//! result accumulated so far, so resumed runs aggregate exactly like a
//! single run would.

use std::path::{Path, PathBuf};

use kindle_core::error::{KindleError, Result};
use kindle_data::processor::{CarryState, FileResult};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Snapshot of a corpus between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusCheckpoint {
    pub state: CarryState,
    pub files: Vec<FileResult>,
}

impl CorpusCheckpoint {
    /// Name of the last file processed, if any.
    pub fn last_filename(&self) -> Option<&str> {
        self.state.last_filename.as_deref()
    }

    /// Load a checkpoint.
    ///
    /// A missing file is a cold start (`Ok(None)`); a file that exists but
    /// cannot be read or decoded is an error.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(KindleError::FileRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        info!("Reading history from {}", path.display());
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| KindleError::CheckpointCorrupt {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Store the checkpoint atomically: write a temporary file next to
    /// `path`, then rename it into place.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        info!("Storing state into {}", path.display());
        let json = serde_json::to_string(self)?;
        let tmp = tmp_path(path);

        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&tmp, &json)?;
            std::fs::rename(&tmp, path)
        };
        write().map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            KindleError::CheckpointWrite {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use kindle_data::processor::LogFileProcessor;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn sample() -> CorpusCheckpoint {
        let result = LogFileProcessor::default()
            .process_reader(
                "messages_00001_20120301",
                Cursor::new("120301:080000 a\n120301:081000 b\n"),
                &CarryState::default(),
            )
            .unwrap();
        CorpusCheckpoint {
            state: result.outgoing.clone(),
            files: vec![result],
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        let checkpoint = sample();
        checkpoint.save_to(&path).unwrap();

        let loaded = CorpusCheckpoint::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
        assert_eq!(loaded.last_filename(), Some("messages_00001_20120301"));
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_round_trip_with_unknown_zone_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        let result = LogFileProcessor::default()
            .process_reader(
                "messages_00001_20120301",
                Cursor::new(
                    "120301:080000 cvm[1]: I TimezoneService:TimeZoneChange:offset=5430,zone=Nowhere/Special,save=1:\n",
                ),
                &CarryState::default(),
            )
            .unwrap();
        let checkpoint = CorpusCheckpoint {
            state: result.outgoing.clone(),
            files: vec![result],
        };
        assert!(checkpoint.state.clock.pending.is_some());

        checkpoint.save_to(&path).unwrap();
        let loaded = CorpusCheckpoint::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
    }

    #[test]
    fn test_missing_checkpoint_is_cold_start() {
        let dir = TempDir::new().unwrap();
        assert!(CorpusCheckpoint::load_from(&dir.path().join("none"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_corrupt_checkpoint_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        std::fs::write(&path, "{\"state\": 42").unwrap();
        let err = CorpusCheckpoint::load_from(&path).unwrap_err();
        assert!(matches!(err, KindleError::CheckpointCorrupt { .. }));
        assert!(!err.is_file_fatal());
    }

    #[test]
    fn test_save_creates_parent_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state");
        CorpusCheckpoint::default().save_to(&path).unwrap();
        sample().save_to(&path).unwrap();
        let loaded = CorpusCheckpoint::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.files.len(), 1);
    }

    #[test]
    fn test_failed_save_leaves_previous_checkpoint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        sample().save_to(&path).unwrap();

        // Renaming onto a directory fails.
        let blocked = dir.path().join("blocked");
        std::fs::create_dir_all(blocked.join("inner")).unwrap();
        let err = sample().save_to(&blocked).unwrap_err();
        assert!(matches!(err, KindleError::CheckpointWrite { .. }));
        assert!(!tmp_path(&blocked).exists());
        assert!(CorpusCheckpoint::load_from(&path).unwrap().is_some());
    }
}
