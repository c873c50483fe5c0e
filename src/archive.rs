//! Archive-inspection collaborator contract.
//!
//! Opening zip/rar/7z containers is not done here. An [`ArchiveInspector`]
//! hands back a flat list of entry names plus two flags, and the classifier
//! uses those to extend the tag set. When the container format is unknown the
//! caller falls back to filename-only classification with both flags false.

use std::path::{Path, PathBuf};

/// Tag added when the archive holds 3D model files.
pub const MODEL_FILES_TAG: &str = "STL";

/// Tag added when the archive holds documentation.
pub const DOCUMENTED_TAG: &str = "DOCUMENTED";

const MODEL_EXTENSIONS: &[&str] = &["stl"];
const DOC_EXTENSIONS: &[&str] = &["txt", "pdf", "md"];

/// What an inspector reports about one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveContents {
    /// Entry names in container order
    pub entry_names: Vec<String>,
    pub contains_model_files: bool,
    pub contains_doc_files: bool,
}

impl ArchiveContents {
    /// Build contents from entry names, deriving both flags from the entry
    /// extensions (`.stl` for models, `.txt`/`.pdf`/`.md` for documents).
    #[must_use]
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry_names: Vec<String> = entries.into_iter().map(Into::into).collect();
        let has_ext = |exts: &[&str]| {
            entry_names.iter().any(|name| {
                Path::new(name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
            })
        };
        let contains_model_files = has_ext(MODEL_EXTENSIONS);
        let contains_doc_files = has_ext(DOC_EXTENSIONS);

        Self {
            entry_names,
            contains_model_files,
            contains_doc_files,
        }
    }

    /// Tags implied by the two content flags.
    #[must_use]
    pub fn flag_tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        if self.contains_model_files {
            tags.push(MODEL_FILES_TAG);
        }
        if self.contains_doc_files {
            tags.push(DOCUMENTED_TAG);
        }
        tags
    }
}

/// Errors reported by an archive inspector.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InspectError {
    /// The container format is not one the inspector understands.
    #[error("Unsupported archive format: {0}")]
    UnsupportedSource(PathBuf),

    /// The container could not be listed.
    #[error("Failed to inspect {path}: {message}")]
    Failed { path: PathBuf, message: String },
}

/// Lists the entries of an archive on disk.
pub trait ArchiveInspector: Send + Sync {
    /// Inspect one archive.
    ///
    /// # Errors
    ///
    /// [`InspectError::UnsupportedSource`] for unknown formats, or
    /// [`InspectError::Failed`] when listing fails.
    fn inspect(&self, path: &Path) -> Result<ArchiveContents, InspectError>;
}

/// Inspector that never opens containers: every source is unsupported, so
/// classification always proceeds from the file name alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameOnlyInspector;

impl ArchiveInspector for FilenameOnlyInspector {
    fn inspect(&self, path: &Path) -> Result<ArchiveContents, InspectError> {
        Err(InspectError::UnsupportedSource(path.to_path_buf()))
    }
}

/// Ask `inspector` about `path`, degrading to empty contents on failure.
///
/// Unsupported formats are expected and logged at debug; other failures are
/// logged as warnings.
#[must_use]
pub fn inspect_or_default(inspector: &dyn ArchiveInspector, path: &Path) -> ArchiveContents {
    match inspector.inspect(path) {
        Ok(contents) => contents,
        Err(InspectError::UnsupportedSource(p)) => {
            log::debug!("No content inspection for {}, using file name only", p.display());
            ArchiveContents::default()
        }
        Err(e) => {
            log::warn!("{}", e);
            ArchiveContents::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedInspector(Vec<&'static str>);

    impl ArchiveInspector for FixedInspector {
        fn inspect(&self, _path: &Path) -> Result<ArchiveContents, InspectError> {
            Ok(ArchiveContents::from_entries(self.0.iter().copied()))
        }
    }

    struct FailingInspector;

    impl ArchiveInspector for FailingInspector {
        fn inspect(&self, path: &Path) -> Result<ArchiveContents, InspectError> {
            Err(InspectError::Failed {
                path: path.to_path_buf(),
                message: "corrupt central directory".into(),
            })
        }
    }

    #[test]
    fn test_from_entries_flags() {
        let contents = ArchiveContents::from_entries(["body.STL", "readme.md"]);
        assert!(contents.contains_model_files);
        assert!(contents.contains_doc_files);
        assert_eq!(contents.flag_tags(), vec![MODEL_FILES_TAG, DOCUMENTED_TAG]);
    }

    #[test]
    fn test_from_entries_no_flags() {
        let contents = ArchiveContents::from_entries(["scene.blend", "stl_notes"]);
        assert!(!contents.contains_model_files);
        assert!(!contents.contains_doc_files);
        assert!(contents.flag_tags().is_empty());
        assert_eq!(contents.entry_names.len(), 2);
    }

    #[test]
    fn test_filename_only_inspector_is_unsupported() {
        let err = FilenameOnlyInspector.inspect(Path::new("a.zip")).unwrap_err();
        assert_eq!(err, InspectError::UnsupportedSource(PathBuf::from("a.zip")));
        assert_eq!(err.to_string(), "Unsupported archive format: a.zip");
    }

    #[test]
    fn test_inspect_or_default_degrades() {
        let contents = inspect_or_default(&FailingInspector, Path::new("a.zip"));
        assert_eq!(contents, ArchiveContents::default());

        let contents = inspect_or_default(&FilenameOnlyInspector, Path::new("a.zip"));
        assert_eq!(contents, ArchiveContents::default());
    }

    #[test]
    fn test_inspect_or_default_passes_contents() {
        let inspector = FixedInspector(vec!["part.stl"]);
        let contents = inspect_or_default(&inspector, Path::new("a.zip"));
        assert!(contents.contains_model_files);
    }
}
