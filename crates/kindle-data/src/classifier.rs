//! Line classification.
//!
//! Every log line is matched once against the known line shapes and turned
//! into a [`LineKind`] that the file processor dispatches on.

use regex::Regex;

/// Markers that reveal an unexpected reboot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootMarker {
    /// Kernel version banner.
    KernelBanner,
    /// Init scripts starting.
    InitScripts,
    /// Framework finished booting.
    BootFinished,
}

/// Book related lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookLine<'a> {
    /// The reader switched between booklets (e.g. `Home` and `Bookworm`).
    BookletSwitch { from: &'a str, to: &'a str },
    /// A book was (re)opened.
    Info {
        asin: &'a str,
        length: &'a str,
        position: &'a str,
    },
    /// The last read position was synced.
    PositionSync { position: &'a str },
}

/// The classification of a single log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Reboot(RebootMarker),
    PowerState { from: &'a str, to: &'a str },
    Timezone { offset: &'a str, zone: &'a str },
    Book(BookLine<'a>),
    Unmatched,
}

/// Compiled matchers for the device's log line grammar.
pub struct LineClassifier {
    state_change: Regex,
    tz_change: Regex,
    kernel_banner: Regex,
    init_boot: Regex,
    boot_finished: Regex,
    booklet_change: Regex,
    book_info: Regex,
    position_sync: Regex,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LineClassifier {
    pub fn new() -> Self {
        Self {
            state_change: Regex::new(r"^.*?powerd.*?def:statech.*?:State change: (.*) -> (.*)$")
                .expect("regex is valid"),
            tz_change: Regex::new(r"^.*TimezoneService:TimeZoneChange:offset=(.*),zone=(.*),.*$")
                .expect("regex is valid"),
            kernel_banner: Regex::new(
                r"^.*Linux #\d [A-Za-z]{3} [A-Za-z]{3} \d{1,2} \d{2}:\d{2}:\d{2} [A-Z]{3} \d{4}$",
            )
            .expect("regex is valid"),
            init_boot: Regex::new(r"^.*system: I S21init_time:initboot:time=.*$")
                .expect("regex is valid"),
            boot_finished: Regex::new(
                r"^.*system: I S96boot_finished:def:Boot finished script received framework booted event.*$",
            )
            .expect("regex is valid"),
            booklet_change: Regex::new(
                r"^.*: I BookletManager:SwitchingBooklets:from=(.*),to=(.*):.*$",
            )
            .expect("regex is valid"),
            book_info: Regex::new(
                r"^.*: I Reader:BOOK INFO:book asin=(.*?),.*,length=(.*?),.*,last read position=(.*?),.*$",
            )
            .expect("regex is valid"),
            position_sync: Regex::new(r"^.*: I Reader:SYNC LPR:position=(.*?):Send LPR to server.*$")
                .expect("regex is valid"),
        }
    }

    /// Classify `line`; the first matching shape wins.
    ///
    /// Reboot markers are checked first, then power-state changes,
    /// timezone changes and finally book lines.
    pub fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        let line = line.trim_end_matches(['\r', '\n']);

        if self.kernel_banner.is_match(line) {
            return LineKind::Reboot(RebootMarker::KernelBanner);
        }
        if self.init_boot.is_match(line) {
            return LineKind::Reboot(RebootMarker::InitScripts);
        }
        if self.boot_finished.is_match(line) {
            return LineKind::Reboot(RebootMarker::BootFinished);
        }
        if let Some((from, to)) = captures2(&self.state_change, line) {
            return LineKind::PowerState { from, to };
        }
        if let Some((offset, zone)) = captures2(&self.tz_change, line) {
            return LineKind::Timezone { offset, zone };
        }
        if let Some((from, to)) = captures2(&self.booklet_change, line) {
            return LineKind::Book(BookLine::BookletSwitch { from, to });
        }
        if let Some(caps) = self.book_info.captures(line) {
            if let (Some(asin), Some(length), Some(position)) = (caps.get(1), caps.get(2), caps.get(3)) {
                return LineKind::Book(BookLine::Info {
                    asin: asin.as_str(),
                    length: length.as_str(),
                    position: position.as_str(),
                });
            }
        }
        if let Some(position) = self
            .position_sync
            .captures(line)
            .and_then(|caps| caps.get(1))
        {
            return LineKind::Book(BookLine::PositionSync {
                position: position.as_str(),
            });
        }
        LineKind::Unmatched
    }
}

fn captures2<'a>(re: &Regex, line: &'a str) -> Option<(&'a str, &'a str)> {
    let caps = re.captures(line)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
