//! JSON reports for classification runs and duplicate scans.
//!
//! # Output Schema
//!
//! Classification:
//!
//! ```json
//! {
//!   "files": [
//!     {
//!       "path": "/lib/HEX3D_Figure_Pack_v2.zip",
//!       "original_name": "HEX3D_Figure_Pack_v2.zip",
//!       "suggested_name": "FIGURE Pack v2 [HEX3D]",
//!       "category": "FIGURE",
//!       "tags": ["HEX3D"],
//!       "status": "pending"
//!     }
//!   ],
//!   "summary": { "total_files": 1, "categories": { "FIGURE": 1 }, "exit_code": 0 }
//! }
//! ```
//!
//! Duplicate scan:
//!
//! ```json
//! {
//!   "groups": [{ "digest": "e3b0...", "size": 1024, "files": ["/a.zip", "/b.zip"] }],
//!   "pairs": [{ "canonical": "/a.zip", "duplicate": "/b.zip",
//!               "match_type": "identical_content", "status": { "state": "pending" } }],
//!   "summary": { "total_files": 3, "duplicate_groups": 1, "reclaimable_space": 1024 },
//!   "resolution": null
//! }
//! ```

use std::io::Write;

use indexmap::IndexMap;
use serde::Serialize;

use super::ClassificationRow;
use crate::actions::ResolutionReport;
use crate::duplicates::{DuplicateGroup, DuplicatePair, MatchType, PairStatus, ScanSummary};
use crate::error::ExitCode;

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}

/// Totals for a classification run.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationSummary {
    pub total_files: usize,
    /// Files per category, in order of first appearance
    pub categories: IndexMap<String, usize>,
    pub errors: usize,
    pub exit_code: i32,
    pub exit_code_name: String,
}

/// Classification rows plus a summary.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub files: Vec<ClassificationRow>,
    pub summary: ClassificationSummary,
}

impl ClassificationReport {
    #[must_use]
    pub fn new(rows: Vec<ClassificationRow>, errors: usize, exit_code: ExitCode) -> Self {
        let mut categories: IndexMap<String, usize> = IndexMap::new();
        for row in &rows {
            *categories.entry(row.category.clone()).or_default() += 1;
        }
        Self {
            summary: ClassificationSummary {
                total_files: rows.len(),
                categories,
                errors,
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
            files: rows,
        }
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

/// A confirmed duplicate group.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// Full-content digest as hexadecimal string (64 characters)
    pub digest: String,
    /// Size of each member in bytes
    pub size: u64,
    /// Members in first-seen order; the first is canonical
    pub files: Vec<String>,
}

impl JsonDuplicateGroup {
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup) -> Self {
        Self {
            digest: group.digest_hex(),
            size: group.canonical().map_or(0, |f| f.size),
            files: group
                .files
                .iter()
                .map(|f| f.path.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// A duplicate pair and its resolution status.
#[derive(Debug, Clone, Serialize)]
pub struct JsonPair {
    pub canonical: String,
    pub duplicate: String,
    pub match_type: MatchType,
    pub status: PairStatus,
}

impl From<&DuplicatePair> for JsonPair {
    fn from(pair: &DuplicatePair) -> Self {
        Self {
            canonical: pair.canonical.path.to_string_lossy().into_owned(),
            duplicate: pair.duplicate.path.to_string_lossy().into_owned(),
            match_type: pair.match_type,
            status: pair.status.clone(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    pub total_files: usize,
    pub total_size: u64,
    /// Entries dropped because they named a file already listed
    pub aliases_skipped: usize,
    /// Files left out of duplicate detection (empty or unreadable)
    pub unfingerprinted: usize,
    pub quick_collisions: usize,
    pub unverified: usize,
    pub duplicate_groups: usize,
    /// Duplicate files, excluding each group's canonical member
    pub duplicate_files: usize,
    pub reclaimable_space: u64,
    pub full_reads: usize,
    pub scan_duration_ms: u64,
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "MA000")
    pub exit_code_name: String,
}

impl JsonSummary {
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            total_files: summary.total_files,
            total_size: summary.total_size,
            aliases_skipped: summary.aliases_skipped,
            unfingerprinted: summary.unfingerprinted,
            quick_collisions: summary.quick_collisions,
            unverified: summary.unverified,
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_space,
            full_reads: summary.full_reads,
            scan_duration_ms: u64::try_from(summary.scan_duration.as_millis()).unwrap_or(u64::MAX),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete duplicate-scan output.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    pub groups: Vec<JsonDuplicateGroup>,
    pub pairs: Vec<JsonPair>,
    pub summary: JsonSummary,
    pub resolution: Option<ResolutionReport>,
}

impl DuplicateReport {
    /// Create a report from a scan and, if one ran, its resolution.
    ///
    /// # Example
    ///
    /// ```
    /// use model_archivist::duplicates::{DuplicateGroup, ScanSummary};
    /// use model_archivist::error::ExitCode;
    /// use model_archivist::output::json::DuplicateReport;
    /// use model_archivist::scanner::FileEntry;
    /// use std::path::PathBuf;
    /// use std::time::SystemTime;
    ///
    /// let groups = vec![DuplicateGroup::new([0u8; 32], vec![
    ///     FileEntry::new(PathBuf::from("/a.zip"), 1024, SystemTime::now()),
    ///     FileEntry::new(PathBuf::from("/b.zip"), 1024, SystemTime::now()),
    /// ])];
    /// let pairs = groups[0].pairs();
    /// let report = DuplicateReport::new(&groups, &pairs, &ScanSummary::default(), None, ExitCode::Success);
    /// assert_eq!(report.pairs.len(), 1);
    /// ```
    #[must_use]
    pub fn new(
        groups: &[DuplicateGroup],
        pairs: &[DuplicatePair],
        summary: &ScanSummary,
        resolution: Option<ResolutionReport>,
        exit_code: ExitCode,
    ) -> Self {
        Self {
            groups: groups
                .iter()
                .map(JsonDuplicateGroup::from_duplicate_group)
                .collect(),
            pairs: pairs.iter().map(JsonPair::from).collect(),
            summary: JsonSummary::from_scan_summary(summary, exit_code),
            resolution,
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

fn write_json<T: Serialize, W: Write>(
    value: &T,
    writer: &mut W,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}
