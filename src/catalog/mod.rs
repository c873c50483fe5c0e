//! Catalog of processed files.
//!
//! The catalog stores what classification and fingerprinting produced for
//! each file: the original path and name, both fingerprints, the suggested
//! name, the tag set and a processing [`FileStatus`]. Producers talk to it
//! through [`CatalogSink`], so they do not depend on the storage engine.
//!
//! [`SqliteCatalog`] is the provided implementation.
//!
//! ```
//! use model_archivist::catalog::{CatalogSink, FileRecord, SqliteCatalog};
//! use std::path::Path;
//!
//! let catalog = SqliteCatalog::open_in_memory().unwrap();
//! let record = FileRecord::new(Path::new("/lib/Knight.zip"));
//! catalog.record(&record).unwrap();
//! assert_eq!(catalog.count().unwrap(), 1);
//! ```

pub mod database;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::ClassificationResult;
use crate::scanner::ContentFingerprint;

pub use database::SqliteCatalog;

/// Processing state of a catalogued file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Pending,
    Renamed,
    Skipped,
    Error,
}

impl FileStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Renamed => "renamed",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "renamed" => Ok(Self::Renamed),
            "skipped" => Ok(Self::Skipped),
            "error" => Ok(Self::Error),
            other => Err(CatalogError::UnknownStatus(other.to_string())),
        }
    }
}

/// Errors from catalog storage.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot create catalog directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode classification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("unknown file status '{0}'")]
    UnknownStatus(String),

    #[error("catalog lock poisoned")]
    Poisoned,
}

/// Everything the catalog keeps about one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub original_path: PathBuf,
    pub original_name: String,
    /// Name after a successful rename
    pub new_name: Option<String>,
    pub quick_fingerprint: Option<String>,
    pub full_fingerprint: Option<String>,
    pub classification: Option<ClassificationResult>,
    pub suggested_name: Option<String>,
    pub status: FileStatus,
}

impl FileRecord {
    /// A pending record with only the path filled in.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            original_path: path.to_path_buf(),
            original_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            new_name: None,
            quick_fingerprint: None,
            full_fingerprint: None,
            classification: None,
            suggested_name: None,
            status: FileStatus::Pending,
        }
    }

    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: &ContentFingerprint) -> Self {
        self.quick_fingerprint = fingerprint.quick_hex();
        self.full_fingerprint = fingerprint.full_hex();
        self
    }

    #[must_use]
    pub fn with_classification(
        mut self,
        classification: ClassificationResult,
        suggested_name: impl Into<String>,
    ) -> Self {
        self.classification = Some(classification);
        self.suggested_name = Some(suggested_name.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: FileStatus, new_name: Option<String>) -> Self {
        self.status = status;
        self.new_name = new_name;
        self
    }
}

/// Receives processed-file records.
pub trait CatalogSink: Send + Sync {
    /// Insert or replace the record for `record.original_path`.
    ///
    /// Returns the row id of the stored file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the record cannot be stored.
    fn record(&self, record: &FileRecord) -> Result<i64, CatalogError>;

    /// Update status and new name of an already recorded file.
    ///
    /// Returns `false` when no record exists for `original_path`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the update fails.
    fn update_status(
        &self,
        original_path: &Path,
        new_name: Option<&str>,
        status: FileStatus,
    ) -> Result<bool, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            FileStatus::Pending,
            FileStatus::Renamed,
            FileStatus::Skipped,
            FileStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<FileStatus>().unwrap(), status);
        }
        assert!(matches!(
            "lost".parse::<FileStatus>(),
            Err(CatalogError::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_record_builders() {
        let fingerprint = ContentFingerprint {
            quick: Some([0xab; 16]),
            full: None,
        };
        let record = FileRecord::new(Path::new("/lib/Knight.zip"))
            .with_fingerprint(&fingerprint)
            .with_status(FileStatus::Renamed, Some("FIGURE Knight.zip".into()));

        assert_eq!(record.original_name, "Knight.zip");
        assert_eq!(record.quick_fingerprint.as_deref(), Some("ab".repeat(16).as_str()));
        assert!(record.full_fingerprint.is_none());
        assert_eq!(record.status, FileStatus::Renamed);
    }
}
