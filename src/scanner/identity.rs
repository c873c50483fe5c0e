//! Same-file detection.
//!
//! Two candidates can name the same bytes on disk: a path listed twice, a
//! directory given together with a file inside it, a symlink followed during
//! the walk, or a hardlink. Those are one file, not duplicates, and letting
//! both through would let the resolver delete the only copy.
//!
//! On Unix a file is identified by its `(device, inode)` pair. Elsewhere the
//! canonical path is used, which still catches repeated and symlinked paths.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::FileEntry;

/// What makes two paths the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileIdentity {
    /// Device and inode numbers
    Inode { device: u64, inode: u64 },
    /// Canonical path, or the path as given when it cannot be resolved
    Path(PathBuf),
}

impl FileIdentity {
    /// Identify the file at `path`.
    #[must_use]
    pub fn of(path: &Path) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            if let Ok(metadata) = fs::metadata(path) {
                return Self::Inode {
                    device: metadata.dev(),
                    inode: metadata.ino(),
                };
            }
        }
        Self::Path(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
    }
}

/// Remembers identities already seen.
#[derive(Debug, Default)]
pub struct IdentityTracker {
    seen: HashSet<FileIdentity>,
}

impl IdentityTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time the file behind `path` is offered.
    pub fn first_sighting(&mut self, path: &Path) -> bool {
        self.seen.insert(FileIdentity::of(path))
    }

    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// Keep the first entry for each distinct file, in order.
///
/// Returns the kept entries and how many were dropped as aliases.
#[must_use]
pub fn retain_distinct(files: Vec<FileEntry>) -> (Vec<FileEntry>, usize) {
    let mut tracker = IdentityTracker::new();
    let before = files.len();
    let kept: Vec<FileEntry> = files
        .into_iter()
        .filter(|file| {
            let first = tracker.first_sighting(&file.path);
            if !first {
                log::debug!("Same file listed again, skipping: {}", file.path.display());
            }
            first
        })
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn entry(path: PathBuf) -> FileEntry {
        FileEntry::new(path, 3, SystemTime::now())
    }

    #[test]
    fn test_repeated_path_is_one_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        fs::write(&path, b"abc").unwrap();

        let mut tracker = IdentityTracker::new();
        assert!(tracker.first_sighting(&path));
        assert!(!tracker.first_sighting(&path));
        assert!(!tracker.first_sighting(&dir.path().join(".").join("a.zip")));
        assert_eq!(tracker.seen_count(), 1);
    }

    #[test]
    fn test_distinct_files_with_same_content_are_kept() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.zip");
        let b = dir.path().join("b.zip");
        fs::write(&a, b"abc").unwrap();
        fs::write(&b, b"abc").unwrap();

        let (kept, dropped) = retain_distinct(vec![entry(a.clone()), entry(b), entry(a)]);
        assert_eq!(kept.len(), 2);
        assert_eq!(dropped, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_hardlink_and_symlink_share_identity() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("original.zip");
        fs::write(&original, b"abc").unwrap();
        let hard = dir.path().join("hard.zip");
        fs::hard_link(&original, &hard).unwrap();
        let soft = dir.path().join("soft.zip");
        std::os::unix::fs::symlink(&original, &soft).unwrap();

        assert_eq!(FileIdentity::of(&original), FileIdentity::of(&hard));
        assert_eq!(FileIdentity::of(&original), FileIdentity::of(&soft));
    }

    #[test]
    fn test_missing_path_falls_back_to_path() {
        let path = PathBuf::from("/definitely/not/here.zip");
        assert_eq!(FileIdentity::of(&path), FileIdentity::Path(path));
    }
}
