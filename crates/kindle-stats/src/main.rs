mod bootstrap;
mod report;

use std::io::Write;

use anyhow::Result;
use bootstrap::RunMode;
use kindle_core::collaborators::{Catalog, PositionLabel};
use kindle_core::settings::Settings;
use kindle_runtime::checkpoint::CorpusCheckpoint;
use kindle_runtime::orchestrator::LogCorpus;
use report::ReportContext;

fn main() -> Result<()> {
    let settings = Settings::load();
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("kindle-stats v{} starting", env!("CARGO_PKG_VERSION"));

    let thresholds = settings.thresholds()?;
    let device_zone = settings.device_zone()?;
    let mode = RunMode::detect(&settings.paths)?;
    let state_path = settings.state_path(mode.is_directory());

    let checkpoint = match &state_path {
        Some(path) => CorpusCheckpoint::load_from(path)?,
        None => None,
    };
    let mut corpus = match checkpoint {
        Some(checkpoint) => LogCorpus::from_checkpoint(thresholds.clone(), device_zone, checkpoint),
        None => LogCorpus::new(thresholds.clone(), device_zone),
    };

    match &mode {
        RunMode::Directory(dir) => corpus.process_directory(dir)?,
        RunMode::Files(files) => corpus.process_files(files)?,
    };

    // Merging books validates event order across files; do it before the
    // checkpoint is replaced.
    let books = corpus.books()?;

    if let Some(path) = &state_path {
        if let Err(e) = corpus.checkpoint().save_to(path) {
            tracing::error!(error = %e, "checkpoint not updated");
        }
    }

    let catalog = match &settings.catalog {
        Some(path) => Catalog::load_from(path)?,
        None => Catalog::default(),
    };
    let ctx = ReportContext {
        tz: settings.display_zone(),
        catalog: &catalog,
        labeler: &PositionLabel,
        thresholds: &thresholds,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if settings.book.is_none() {
        report::write_states(&mut out, &corpus, &ctx.tz)?;
    }
    report::write_books(&mut out, &books, &ctx, settings.book.as_deref())?;
    out.flush()?;

    Ok(())
}
