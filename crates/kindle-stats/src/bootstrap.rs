use std::path::PathBuf;

use anyhow::bail;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` takes the classic level names and is mapped to an
/// [`EnvFilter`] directive, falling back to `"info"` when unrecognised.
/// Diagnostics go to stderr so the report on stdout stays clean.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .init();

    Ok(())
}

fn filter_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" | "CRITICAL" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

// ── Input discovery ────────────────────────────────────────────────────────────

/// How the positional paths are to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// A directory of rotated logs, resumed from the checkpoint.
    Directory(PathBuf),
    /// Files processed exactly in the order given.
    Files(Vec<PathBuf>),
}

impl RunMode {
    /// One directory selects directory mode; one file or several paths
    /// select file mode.
    pub fn detect(paths: &[PathBuf]) -> anyhow::Result<Self> {
        match paths {
            [] => bail!("You must specify a dir/file or files to read from!"),
            [single] if single.is_dir() => Ok(RunMode::Directory(single.clone())),
            [single] if single.is_file() => Ok(RunMode::Files(vec![single.clone()])),
            [single] => bail!("Invalid path: {}", single.display()),
            many => Ok(RunMode::Files(many.to_vec())),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, RunMode::Directory(_))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
