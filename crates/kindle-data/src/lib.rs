//! Log ingestion engine for Kindle device logs.
//!
//! Turns raw, clock-skewed, rotated log files into a corrected timeline:
//! lines are classified, their timestamps normalised, and the resulting
//! events drive the power-state and book-session trackers.

pub mod books;
pub mod classifier;
pub mod normalizer;
pub mod power;
pub mod processor;
pub mod reader;

pub use kindle_core as core;
