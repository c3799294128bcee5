//! Interfaces to the decoders that sit outside the ingestion engine.
//!
//! Page-number sidecars and e-book container metadata are only ever used for
//! display, so the engine sees them through these two small traits.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KindleError, Result};

/// Translates a raw reader position into a human page label.
pub trait PageLabeler {
    fn page_label(&self, position: u64) -> String;
}

/// Fallback labeller used when no page-number sidecar is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionLabel;

impl PageLabeler for PositionLabel {
    fn page_label(&self, position: u64) -> String {
        format!("@{}", position)
    }
}

/// Render an optional position through a labeller.
pub fn label_position(labeler: &dyn PageLabeler, position: Option<u64>) -> String {
    match position {
        Some(p) => labeler.page_label(p),
        None => "@?".to_string(),
    }
}

/// Field lookup over a book's descriptive metadata.
pub trait BookMetadata {
    /// Look up a metadata field by case-insensitive name, e.g. `"title"`.
    fn lookup(&self, field: &str) -> Option<String>;

    fn title(&self) -> Option<String> {
        self.lookup("title").or_else(|| self.lookup("updatedtitle"))
    }

    fn author(&self) -> Option<String> {
        self.lookup("creator")
    }
}

/// Metadata for one book as a plain field map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogEntry {
    fields: BTreeMap<String, String>,
}

impl CatalogEntry {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        }
    }
}

impl BookMetadata for CatalogEntry {
    fn lookup(&self, field: &str) -> Option<String> {
        self.fields.get(&field.to_lowercase()).cloned()
    }
}

/// ASIN → metadata map, loaded from a JSON object of objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    /// Load a catalog file. A missing file yields an empty catalog.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(KindleError::FileRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let raw: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(&content)?;
        Ok(Self {
            entries: raw
                .into_iter()
                .map(|(asin, fields)| (asin, CatalogEntry::new(fields)))
                .collect(),
        })
    }

    pub fn get(&self, asin: &str) -> Option<&CatalogEntry> {
        self.entries.get(asin)
    }

    /// Display title: `"<asin>: <title>"` when known, else the bare ASIN.
    pub fn display_title(&self, asin: &str) -> String {
        match self.get(asin).and_then(|m| m.title()) {
            Some(title) => format!("{}: {}", asin, title),
            None => asin.to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
