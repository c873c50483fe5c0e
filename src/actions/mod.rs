//! File actions: duplicate resolution and applying suggested names.
//!
//! This module provides functionality for:
//! - Planning and applying a [`ResolutionAction`] to confirmed duplicate pairs
//! - Moving files to the system trash or deleting them permanently
//! - Renaming files to their suggested names
//!
//! # Safety
//!
//! Before a file is marked or deleted, its size and modification time are
//! compared with the values captured during the scan. A file that changed in
//! between is left alone and the pair is reported as an error.

pub mod rename;
pub mod resolve;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use rename::{apply_rename, plan_rename, RenameOutcome, RenamePlan};
pub use resolve::{
    marked_path, newer_and_older, plan, PlannedEffect, ResolutionAction, ResolutionReport,
    ResolveConfig, Resolver,
};

/// Error type for file actions.
#[derive(Debug, Error)]
pub enum ActionError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File size or modification time differs from the scan snapshot.
    #[error("modified since scan")]
    ModifiedSinceScan(PathBuf),

    /// The rename target is already taken.
    #[error("target already exists: {0}")]
    TargetExists(PathBuf),

    #[error("trash operation failed for {path}: {message}")]
    Trash { path: PathBuf, message: String },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl ActionError {
    pub(crate) fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::ModifiedSinceScan(p)
            | Self::TargetExists(p)
            | Self::Trash { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::Pool(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_kinds() {
        let path = Path::new("/x.zip");
        let err = ActionError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, ActionError::NotFound(_)));

        let err = ActionError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, ActionError::PermissionDenied(_)));

        let err = ActionError::from_io(path, io::Error::other("disk on fire"));
        assert!(matches!(err, ActionError::Io { .. }));
        assert_eq!(err.path(), Some(path));
    }

    #[test]
    fn test_modified_message_is_short() {
        let err = ActionError::ModifiedSinceScan(PathBuf::from("/x.zip"));
        assert_eq!(err.to_string(), "modified since scan");
    }
}
