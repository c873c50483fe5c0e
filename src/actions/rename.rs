//! Renaming files to their suggested names.
//!
//! A [`RenamePlan`] keeps the file in its directory and swaps only the file
//! name. Applying a plan never fails outright: the outcome carries a
//! [`FileStatus`] and an optional message for the report.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::ActionError;
use crate::catalog::FileStatus;
use crate::naming::sanitize_file_name;

/// A pending rename in one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Sanitised file name of `target`
    pub new_name: String,
}

impl RenamePlan {
    /// True when the file already has the suggested name.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.source == self.target
    }
}

/// Result of applying one [`RenamePlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    pub plan: RenamePlan,
    pub status: FileStatus,
    pub message: Option<String>,
}

/// Plan renaming `source` to `new_file_name` in the same directory.
#[must_use]
pub fn plan_rename(source: &Path, new_file_name: &str) -> RenamePlan {
    let new_name = sanitize_file_name(new_file_name);
    RenamePlan {
        source: source.to_path_buf(),
        target: source.with_file_name(&new_name),
        new_name,
    }
}

/// Apply `plan`, skipping when the target exists unless `overwrite` is set.
#[must_use]
pub fn apply_rename(plan: &RenamePlan, overwrite: bool) -> RenameOutcome {
    let outcome = |status, message: Option<String>| RenameOutcome {
        plan: plan.clone(),
        status,
        message,
    };

    if plan.is_noop() {
        return outcome(FileStatus::Skipped, Some("already named".to_string()));
    }
    if plan.new_name.is_empty() {
        return outcome(FileStatus::Skipped, Some("empty suggested name".to_string()));
    }
    if !overwrite && plan.target.exists() {
        log::info!(
            "Skipping {}: {} already exists",
            plan.source.display(),
            plan.target.display()
        );
        return outcome(
            FileStatus::Skipped,
            Some(ActionError::TargetExists(plan.target.clone()).to_string()),
        );
    }

    match fs::rename(&plan.source, &plan.target) {
        Ok(()) => {
            log::info!(
                "Renamed: {} -> {}",
                plan.source.display(),
                plan.target.display()
            );
            outcome(FileStatus::Renamed, None)
        }
        Err(e) => {
            let err = ActionError::from_io(&plan.source, e);
            log::warn!("Rename failed: {}", err);
            outcome(FileStatus::Error, Some(err.to_string()))
        }
    }
}
