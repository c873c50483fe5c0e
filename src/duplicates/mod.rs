//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Quick-fingerprint bucketing (pass 1)
//! - Full-digest confirmation (pass 2)
//! - Duplicate groups, pairs and their resolution status

pub mod finder;
pub mod groups;

pub use finder::{DuplicateFinder, FinderConfig, FinderError, ScanSummary};
pub use groups::{
    bucket_in_order, pairs_from_groups, DuplicateGroup, DuplicatePair, MatchType, PairStatus,
};
