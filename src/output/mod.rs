//! Report formatters.
//!
//! This module provides different output formats:
//! - JSON for classification runs and duplicate scans ([`json`])
//! - CSV of classification rows for spreadsheet import ([`csv`])
//!
//! # Example
//!
//! ```no_run
//! use model_archivist::duplicates::DuplicateFinder;
//! use model_archivist::error::ExitCode;
//! use model_archivist::output::json::DuplicateReport;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, summary) = finder.find_duplicates(Vec::new()).unwrap();
//!
//! let report = DuplicateReport::new(&groups, &[], &summary, None, ExitCode::NoDuplicates);
//! println!("{}", report.to_json_pretty().unwrap());
//! ```

pub mod csv;
pub mod json;

use std::path::Path;

use serde::Serialize;

use crate::catalog::FileStatus;
use crate::classify::ClassificationResult;
use crate::scanner::ContentFingerprint;

pub use self::csv::{CsvOutput, CsvOutputError};
pub use self::json::{ClassificationReport, DuplicateReport, JsonOutputError};

/// One classified file, as reported by every format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationRow {
    pub path: String,
    pub original_name: String,
    pub suggested_name: String,
    pub category: String,
    pub franchise: Option<String>,
    pub creator: Option<String>,
    pub version: Option<String>,
    /// Sorted tags
    pub tags: Vec<String>,
    pub is_nsfw: bool,
    pub priority_override: bool,
    pub status: FileStatus,
    pub quick_fingerprint: Option<String>,
    pub full_fingerprint: Option<String>,
}

impl ClassificationRow {
    #[must_use]
    pub fn new(path: &Path, result: &ClassificationResult, suggested_name: impl Into<String>) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
            original_name: result.original_name.clone(),
            suggested_name: suggested_name.into(),
            category: result.category.clone(),
            franchise: result.franchise.clone(),
            creator: result.creator.clone(),
            version: result.version.clone(),
            tags: result.tags.iter().cloned().collect(),
            is_nsfw: result.is_nsfw,
            priority_override: result.priority_override,
            status: FileStatus::Pending,
            quick_fingerprint: None,
            full_fingerprint: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: FileStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: &ContentFingerprint) -> Self {
        self.quick_fingerprint = fingerprint.quick_hex();
        self.full_fingerprint = fingerprint.full_hex();
        self
    }
}
