//! Model Archivist - naming, tagging and duplicate detection for 3D-model
//! archive collections.
//!
//! Two independent pipelines share the scanner and the rule set:
//!
//! - [`classify`] turns a file name into a category, franchise, creator,
//!   version and tag set, and [`naming`] composes a normalized name from it.
//! - [`duplicates`] finds byte-identical files with a sampled quick
//!   fingerprint followed by a full digest, and [`actions`] resolves each
//!   duplicate pair.
//!
//! Processed files can be recorded in a SQLite [`catalog`].

pub mod actions;
pub mod app;
pub mod archive;
pub mod catalog;
pub mod classify;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod naming;
pub mod output;
pub mod progress;
pub mod rules;
pub mod scanner;
pub mod signal;

pub use app::run_app;
