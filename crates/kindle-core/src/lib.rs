//! Shared vocabulary for the Kindle log statistics tools.
//!
//! Holds the error type, the domain models exchanged between the ingestion
//! engine and the presentation layer, device-zone time handling, formatting
//! helpers, collaborator traits and the command-line settings.

pub mod collaborators;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{KindleError, Result};
