//! Candidate discovery using walkdir.
//!
//! # Overview
//!
//! [`Walker`] traverses a directory tree in file-name order and yields every
//! regular file whose extension is in the configured set, skipping anything
//! matched by the gitignore-style ignore patterns. Errors are yielded as
//! values so one unreadable directory never stops the walk.
//!
//! [`collect_candidates`] accepts a mix of files and directories the way the
//! command line does: files are taken as given, directories are walked, and
//! a file reached more than once is kept only the first time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use walkdir::WalkDir;

use super::identity::IdentityTracker;
use super::{FileEntry, ScanError, WalkerConfig};

/// Directory walker for archive candidates.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Stop yielding entries once `flag` becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build the ignore matcher from the configured patterns.
    fn build_gitignore(&self) -> Option<Gitignore> {
        if self.config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        if let Err(e) = builder.case_insensitive(true) {
            log::warn!("Case-insensitive ignore matching unavailable: {}", e);
        }
        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    fn is_ignored(&self, path: &Path, is_dir: bool, gitignore: Option<&Gitignore>) -> bool {
        let Some(gi) = gitignore else {
            return false;
        };
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        gi.matched(relative, is_dir).is_ignore()
    }

    fn is_hidden(&self, path: &Path) -> bool {
        path != self.root
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
    }

    fn has_wanted_extension(&self, path: &Path) -> bool {
        if self.config.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .is_some_and(|e| self.config.extensions.contains(&e))
    }

    /// Walk the tree, yielding candidates in file-name order.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let gitignore = self.build_gitignore();

        let entries = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                let path = entry.path();
                if self.config.skip_hidden && self.is_hidden(path) {
                    return false;
                }
                !self.is_ignored(path, entry.file_type().is_dir(), gitignore.as_ref())
            });

        entries.filter_map(move |entry| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() && !entry.path_is_symlink() {
                        return None;
                    }
                    let path = entry.path();
                    if !self.has_wanted_extension(path) {
                        log::trace!("Skipping non-archive: {}", path.display());
                        return None;
                    }
                    let metadata = match entry.metadata() {
                        Ok(m) => m,
                        Err(e) => {
                            log::warn!("Cannot stat {}: {}", path.display(), e);
                            return Some(Err(ScanError::Io {
                                path: path.to_path_buf(),
                                source: e.into(),
                            }));
                        }
                    };
                    if !metadata.is_file() {
                        return None;
                    }
                    Some(Ok(FileEntry::new(
                        path.to_path_buf(),
                        metadata.len(),
                        metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    )))
                }
                Err(e) => {
                    let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                    Some(Err(ScanError::from_io(&path, source)))
                }
            }
        })
    }
}

/// Expand command-line inputs into candidates.
///
/// Files are kept as given; directories are walked with `config`. Overlapping
/// inputs, symlinks and hardlinks yield each file once. Errors are returned
/// alongside the candidates, never instead of them.
#[must_use]
pub fn collect_candidates(
    inputs: &[PathBuf],
    config: &WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
) -> (Vec<FileEntry>, Vec<ScanError>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    let mut tracker = IdentityTracker::new();
    let mut keep = |file: FileEntry, files: &mut Vec<FileEntry>| {
        if tracker.first_sighting(&file.path) {
            files.push(file);
        } else {
            log::debug!("Already collected, skipping: {}", file.path.display());
        }
    };

    for input in inputs {
        if input.is_dir() {
            let mut walker = Walker::new(input, config.clone());
            if let Some(flag) = &shutdown_flag {
                walker = walker.with_shutdown_flag(Arc::clone(flag));
            }
            for entry in walker.walk() {
                match entry {
                    Ok(file) => keep(file, &mut files),
                    Err(e) => errors.push(e),
                }
            }
        } else {
            match FileEntry::from_path(input) {
                Ok(file) => keep(file, &mut files),
                Err(e) => errors.push(e),
            }
        }
    }

    log::debug!(
        "Collected {} candidates ({} errors) from {} inputs",
        files.len(),
        errors.len(),
        inputs.len()
    );
    (files, errors)
}
