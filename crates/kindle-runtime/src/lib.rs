//! Corpus orchestration for Kindle log statistics.
//!
//! Drives the ingestion engine across a whole set of rotated log files and
//! persists the carried state between runs.

pub mod checkpoint;
pub mod orchestrator;

pub use kindle_core as core;
pub use kindle_data as data;
