//! Plain-text report of power states and reading sessions.

use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use kindle_core::collaborators::{label_position, Catalog, PageLabeler};
use kindle_core::formatting::{format_ctime, format_hms, format_read_end};
use kindle_core::models::{ReadSession, Thresholds};
use kindle_data::books::Book;
use kindle_runtime::orchestrator::LogCorpus;

/// Display collaborators shared by the report sections.
pub struct ReportContext<'a> {
    pub tz: Tz,
    pub catalog: &'a Catalog,
    pub labeler: &'a dyn PageLabeler,
    pub thresholds: &'a Thresholds,
}

// ── Power states ──────────────────────────────────────────────────────────────

/// Covered range and time spent per power state, longest first.
pub fn write_states<W: Write>(out: &mut W, corpus: &LogCorpus, tz: &Tz) -> io::Result<()> {
    writeln!(out)?;
    if let (Some(start), Some(end)) = (corpus.start(), corpus.end()) {
        writeln!(
            out,
            "Logs cover {} => {}",
            format_ctime(&start, tz),
            format_ctime(&end, tz)
        )?;
    }
    let mut durations: Vec<(String, i64)> = corpus.state_durations().into_iter().collect();
    durations.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (state, secs) in durations {
        writeln!(out, "{}: {} ({})", state, secs, format_hms(secs))?;
    }
    writeln!(out)
}

// ── Books ─────────────────────────────────────────────────────────────────────

/// Per-book reading history, most recently read first.
///
/// With `only_book`, just that book is shown together with its length and
/// the raw events behind every read.
pub fn write_books<W: Write>(
    out: &mut W,
    books: &BTreeMap<String, Book>,
    ctx: &ReportContext<'_>,
    only_book: Option<&str>,
) -> io::Result<()> {
    let mut listed: Vec<(Option<DateTime<Utc>>, &Book, Vec<ReadSession>)> = books
        .values()
        .filter(|book| only_book.map_or(true, |asin| book.asin == asin))
        .map(|book| {
            let reads = book.reads_with(ctx.thresholds);
            (last_finished(&reads), book, reads)
        })
        .collect();
    // In-progress books (None) sort before everything else.
    listed.sort_by(|a, b| {
        let key = |finished: &Option<DateTime<Utc>>| finished.unwrap_or(DateTime::<Utc>::MAX_UTC);
        key(&b.0)
            .cmp(&key(&a.0))
            .then_with(|| b.1.asin.cmp(&a.1.asin))
    });

    let mut total = 0;
    for (finished, book, reads) in &listed {
        writeln!(
            out,
            "{}: Read {:2} times. Last Finished: {}",
            ctx.catalog.display_title(&book.asin),
            reads.len(),
            format_read_end(finished.as_ref(), &ctx.tz)
        )?;
        if only_book.is_some() {
            writeln!(out, " Length: {}", book.length)?;
        }

        let mut events = book.events.events().iter().peekable();
        for read in reads {
            writeln!(
                out,
                " - {} => {}. Reading time {} ({} => {})",
                format_ctime(&read.start, &ctx.tz),
                format_read_end(read.end.as_ref(), &ctx.tz),
                format_hms(read.read_seconds),
                label_position(ctx.labeler, read.start_position),
                label_position(ctx.labeler, read.end_position)
            )?;
            total += read.read_seconds;

            if only_book.is_some() {
                while let Some(event) =
                    events.next_if(|e| read.end.map_or(true, |end| e.timestamp <= end))
                {
                    writeln!(
                        out,
                        "   {} on page {} @ {}",
                        event.kind.describe(),
                        label_position(ctx.labeler, event.position),
                        format_ctime(&event.timestamp, &ctx.tz)
                    )?;
                }
            }
        }
        writeln!(out)?;
    }

    if only_book.is_none() {
        writeln!(
            out,
            "Read {} books in total. {} of reading time",
            listed.len(),
            format_hms(total)
        )?;
    }
    Ok(())
}

/// End of the most recent read; `None` while a read is in progress.
fn last_finished(reads: &[ReadSession]) -> Option<DateTime<Utc>> {
    if reads.iter().any(ReadSession::in_progress) {
        return None;
    }
    reads.iter().filter_map(|r| r.end).max()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use kindle_core::collaborators::PositionLabel;
    use kindle_core::time_utils::DeviceZone;
    use tempfile::TempDir;

    const ASIN: &str = "B000FC1PJI";

    fn book_info(ts: &str, asin: &str, position: u64) -> String {
        format!(
            "{ts} cvm[1]: I Reader:BOOK INFO:book asin={asin},file=/mnt/us/documents/x.azw,type=EBOK,length=5000,access=1,last read position={position},isEncrypted=false:\n"
        )
    }

    fn lpr(ts: &str, position: u64) -> String {
        format!("{ts} cvm[1]: I Reader:SYNC LPR:position={position}:Send LPR to server\n")
    }

    fn corpus_from(text: &str) -> (TempDir, LogCorpus) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("messages_00001_20120301");
        std::fs::write(&path, text).unwrap();
        let mut corpus = LogCorpus::new(Thresholds::default(), DeviceZone::fixed(0).unwrap());
        corpus.process_files(&[path]).unwrap();
        (dir, corpus)
    }

    fn render(corpus: &LogCorpus, catalog: &Catalog, only_book: Option<&str>) -> String {
        let thresholds = Thresholds::default();
        let ctx = ReportContext {
            tz: Tz::UTC,
            catalog,
            labeler: &PositionLabel,
            thresholds: &thresholds,
        };
        let mut out = Vec::new();
        write_books(&mut out, &corpus.books().unwrap(), &ctx, only_book).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn sample_log() -> String {
        [
            book_info("120301:200000", ASIN, 100),
            lpr("120301:201000", 150),
            book_info("120301:202000", "B00OTHER01", 10),
            lpr("120301:203000", 40),
        ]
        .concat()
    }

    #[test]
    fn test_write_states() {
        let (_dir, corpus) = corpus_from("120301:200000 a\n120301:203000 b\n");
        let mut out = Vec::new();
        write_states(&mut out, &corpus, &Tz::UTC).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Logs cover Thu Mar  1 20:00:00 2012 => Thu Mar  1 20:30:00 2012"));
        assert!(text.contains("NO_DATA: 1800 (30 mins)"));
    }

    #[test]
    fn test_write_books_summary() {
        let (_dir, corpus) = corpus_from(&sample_log());
        let text = render(&corpus, &Catalog::default(), None);

        // The other book is still open, so it is listed first.
        let other = text.find("B00OTHER01: Read  1 times. Last Finished: In Progress!").unwrap();
        let first = text.find(&format!("{ASIN}: Read  1 times. Last Finished: Thu Mar  1 20:20:00 2012")).unwrap();
        assert!(other < first);
        assert!(text.contains(
            " - Thu Mar  1 20:00:00 2012 => Thu Mar  1 20:20:00 2012. Reading time 10 mins (@100 => @150)"
        ));
        assert!(text.contains("Read 2 books in total. 20 mins of reading time"));
    }

    #[test]
    fn test_write_single_book_with_events() {
        let (_dir, corpus) = corpus_from(&sample_log());
        let text = render(&corpus, &Catalog::default(), Some(ASIN));

        assert!(!text.contains("B00OTHER01"));
        assert!(text.contains(" Length: 5000"));
        assert!(text.contains("   PICKED UP on page @100 @ Thu Mar  1 20:00:00 2012"));
        assert!(text.contains("   CLOSED on page @150 @ Thu Mar  1 20:10:00 2012"));
        assert!(text.contains("   PUT DOWN on page @150 @ Thu Mar  1 20:20:00 2012"));
        assert!(!text.contains("books in total"));
    }

    #[test]
    fn test_catalog_titles_are_used() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, format!(r#"{{"{ASIN}": {{"Title": "Dune"}}}}"#)).unwrap();
        let catalog = Catalog::load_from(&path).unwrap();

        let (_logs, corpus) = corpus_from(&sample_log());
        let text = render(&corpus, &catalog, None);
        assert!(text.contains(&format!("{ASIN}: Dune: Read  1 times.")));
    }
}
