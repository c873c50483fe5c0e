//! Applying a [`ResolutionAction`] to confirmed duplicate pairs.
//!
//! # Overview
//!
//! Resolution is split into two steps so the policy can be checked without
//! touching the disk:
//!
//! 1. [`plan`] turns a pair and an action into a [`PlannedEffect`]
//!    (keep, rename one file with the marker, or delete one file).
//! 2. [`Resolver::apply`] executes the planned effects and writes a terminal
//!    [`PairStatus`] into every pending pair.
//!
//! Pairs that share a file are applied one after another in input order;
//! pairs with disjoint files run concurrently on a bounded pool. A failing
//! pair records [`PairStatus::Error`] and never stops the batch.
//!
//! # Example
//!
//! ```no_run
//! use model_archivist::actions::{ResolutionAction, ResolveConfig, Resolver};
//! use model_archivist::duplicates::{pairs_from_groups, DuplicateFinder};
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, _) = finder.find_duplicates(Vec::new()).unwrap();
//! let mut pairs = pairs_from_groups(&groups);
//!
//! let resolver = Resolver::new(ResolveConfig::default());
//! let report = resolver.apply(&mut pairs, ResolutionAction::MarkNewerAsDupe).unwrap();
//! println!("{}", report.summary());
//! ```

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::ActionError;
use crate::duplicates::{DuplicatePair, PairStatus};
use crate::progress::ProgressCallback;
use crate::scanner::path_utils::path_key;
use crate::scanner::FileEntry;

/// Default marker appended to the stem of a file marked as duplicate.
pub const DEFAULT_MARKER: &str = "_DUPE";

/// What to do with each confirmed duplicate pair.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionAction {
    /// Leave both files untouched
    #[default]
    KeepBoth,
    /// Rename the newer file with the duplicate marker
    #[value(name = "mark-newer")]
    #[serde(rename = "mark-newer")]
    MarkNewerAsDupe,
    /// Rename the older file with the duplicate marker
    #[value(name = "mark-older")]
    #[serde(rename = "mark-older")]
    MarkOlderAsDupe,
    /// Remove the newer file
    DeleteNewer,
    /// Remove the older file
    DeleteOlder,
}

impl ResolutionAction {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::KeepBoth => "Keep Both",
            Self::MarkNewerAsDupe => "Mark Newer as DUPE",
            Self::MarkOlderAsDupe => "Mark Older as DUPE",
            Self::DeleteNewer => "Delete Newer",
            Self::DeleteOlder => "Delete Older",
        }
    }

    /// True for actions that remove a file.
    #[must_use]
    pub fn is_destructive(self) -> bool {
        matches!(self, Self::DeleteNewer | Self::DeleteOlder)
    }
}

impl std::fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Filesystem effect of an action on one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedEffect {
    Keep,
    Mark { file: FileEntry, new_path: PathBuf },
    Delete { file: FileEntry },
}

/// Split a pair into `(newer, older)` by modification time.
///
/// When both times are equal the duplicate counts as newer, so the
/// canonical (first-seen) file is treated as the original.
#[must_use]
pub fn newer_and_older(pair: &DuplicatePair) -> (&FileEntry, &FileEntry) {
    if pair.duplicate.modified >= pair.canonical.modified {
        (&pair.duplicate, &pair.canonical)
    } else {
        (&pair.canonical, &pair.duplicate)
    }
}

/// `dir/stem.ext` becomes `dir/stem<marker>.ext`.
#[must_use]
pub fn marked_path(path: &Path, marker: &str) -> PathBuf {
    let mut name: OsString = path.file_stem().map(OsString::from).unwrap_or_default();
    name.push(marker);
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// Decide what `action` does to `pair`, without touching the disk.
#[must_use]
pub fn plan(pair: &DuplicatePair, action: ResolutionAction, marker: &str) -> PlannedEffect {
    let (newer, older) = newer_and_older(pair);
    let mark = |file: &FileEntry| PlannedEffect::Mark {
        file: file.clone(),
        new_path: marked_path(&file.path, marker),
    };
    match action {
        ResolutionAction::KeepBoth => PlannedEffect::Keep,
        ResolutionAction::MarkNewerAsDupe => mark(newer),
        ResolutionAction::MarkOlderAsDupe => mark(older),
        ResolutionAction::DeleteNewer => PlannedEffect::Delete {
            file: newer.clone(),
        },
        ResolutionAction::DeleteOlder => PlannedEffect::Delete {
            file: older.clone(),
        },
    }
}

/// Configuration for [`Resolver`].
#[derive(Clone)]
pub struct ResolveConfig {
    /// Appended to the stem of marked files
    pub marker: String,
    /// Remove files instead of moving them to the trash
    pub permanent: bool,
    /// Refuse to touch files whose size or mtime changed since the scan
    pub verify_unchanged: bool,
    pub io_threads: usize,
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ResolveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveConfig")
            .field("marker", &self.marker)
            .field("permanent", &self.permanent)
            .field("verify_unchanged", &self.verify_unchanged)
            .field("io_threads", &self.io_threads)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            permanent: false,
            verify_unchanged: true,
            io_threads: 4,
            progress_callback: None,
        }
    }
}

impl ResolveConfig {
    /// Use `marker` for renamed files; blank markers are ignored.
    #[must_use]
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        if !marker.trim().is_empty() {
            self.marker = marker;
        }
        self
    }

    #[must_use]
    pub fn with_permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }

    #[must_use]
    pub fn with_verify_unchanged(mut self, verify: bool) -> Self {
        self.verify_unchanged = verify;
        self
    }

    /// Set the number of I/O threads (minimum 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Counts from one [`Resolver::apply`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    /// Pairs that were pending and received a terminal status
    pub applied: usize,
    /// Pairs that already had a terminal status and were left alone
    pub skipped: usize,
    pub kept: usize,
    pub marked: usize,
    pub deleted: usize,
    pub errors: usize,
    /// Size of deleted files
    pub bytes_freed: u64,
}

impl ResolutionReport {
    /// True when at least one pair ended in [`PairStatus::Error`].
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} pair(s): {} kept, {} marked, {} deleted",
            self.applied, self.kept, self.marked, self.deleted
        );
        if self.errors > 0 {
            text.push_str(&format!(", {} failed", self.errors));
        }
        if self.bytes_freed > 0 {
            text.push_str(&format!(
                ", freed {}",
                bytesize::ByteSize::b(self.bytes_freed)
            ));
        }
        text
    }

    fn record(&mut self, status: &PairStatus, freed: u64) {
        self.applied += 1;
        match status {
            PairStatus::Kept => self.kept += 1,
            PairStatus::Marked { .. } => self.marked += 1,
            PairStatus::Deleted { .. } => {
                self.deleted += 1;
                self.bytes_freed += freed;
            }
            PairStatus::Error { .. } => self.errors += 1,
            PairStatus::Pending => {}
        }
    }
}

/// Executes resolution actions against the filesystem.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolveConfig,
}

impl Resolver {
    #[must_use]
    pub fn new(config: ResolveConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    /// Apply `action` to one pair and return its terminal status.
    ///
    /// Failures are returned as [`PairStatus::Error`], never as `Err`.
    #[must_use]
    pub fn apply_one(&self, pair: &DuplicatePair, action: ResolutionAction) -> PairStatus {
        let effect = plan(pair, action, &self.config.marker);
        match self.execute(&effect) {
            Ok(status) => status,
            Err(e) => {
                log::warn!(
                    "{} failed for {} / {}: {}",
                    action.label(),
                    pair.canonical.path.display(),
                    pair.duplicate.path.display(),
                    e
                );
                PairStatus::Error {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Apply `action` to every pending pair in `pairs`.
    ///
    /// Statuses are written back into `pairs`. Pairs that touch a common
    /// file run sequentially in slice order.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Pool`] if the worker pool cannot be built.
    /// Per-pair failures are recorded in the pair status instead.
    pub fn apply(
        &self,
        pairs: &mut [DuplicatePair],
        action: ResolutionAction,
    ) -> Result<ResolutionReport, ActionError> {
        let mut report = ResolutionReport::default();
        let pending: Vec<usize> = pairs
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.status.is_terminal())
            .map(|(i, _)| i)
            .collect();
        report.skipped = pairs.len() - pending.len();
        if pending.is_empty() {
            return Ok(report);
        }

        let components = components_by_shared_path(pairs, &pending, action, &self.config.marker);
        log::debug!(
            "Resolving {} pair(s) in {} independent batch(es) with {}",
            pending.len(),
            components.len(),
            action.label()
        );

        let callback = self.config.progress_callback.as_ref();
        if let Some(cb) = callback {
            cb.on_phase_start("resolve", pending.len());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .build()?;

        let done = AtomicUsize::new(0);
        let shared: &[DuplicatePair] = pairs;
        let outcomes: Vec<Vec<(usize, PairStatus, u64)>> = pool.install(|| {
            components
                .par_iter()
                .map(|component| {
                    component
                        .iter()
                        .map(|&idx| {
                            let pair = &shared[idx];
                            let status = self.apply_one(pair, action);
                            let freed = match &status {
                                PairStatus::Deleted { path } => {
                                    if *path == pair.canonical.path {
                                        pair.canonical.size
                                    } else {
                                        pair.duplicate.size
                                    }
                                }
                                _ => 0,
                            };
                            let current = done.fetch_add(1, Ordering::SeqCst) + 1;
                            if let Some(cb) = callback {
                                cb.on_progress(current, pair.duplicate.path.to_string_lossy().as_ref());
                            }
                            (idx, status, freed)
                        })
                        .collect()
                })
                .collect()
        });

        if let Some(cb) = callback {
            cb.on_phase_end("resolve");
        }

        for (idx, status, freed) in outcomes.into_iter().flatten() {
            report.record(&status, freed);
            pairs[idx].status = status;
        }

        log::info!("Resolution complete: {}", report.summary());
        Ok(report)
    }

    fn execute(&self, effect: &PlannedEffect) -> Result<PairStatus, ActionError> {
        match effect {
            PlannedEffect::Keep => Ok(PairStatus::Kept),
            PlannedEffect::Mark { file, new_path } => {
                self.check_unchanged(file)?;
                if new_path.exists() {
                    return Err(ActionError::TargetExists(new_path.clone()));
                }
                fs::rename(&file.path, new_path).map_err(|e| ActionError::from_io(&file.path, e))?;
                log::info!(
                    "Marked duplicate: {} -> {}",
                    file.path.display(),
                    new_path.display()
                );
                Ok(PairStatus::Marked {
                    new_path: new_path.clone(),
                })
            }
            PlannedEffect::Delete { file } => {
                self.check_unchanged(file)?;
                if self.config.permanent {
                    permanent_delete(&file.path)?;
                } else {
                    delete_to_trash(&file.path)?;
                }
                Ok(PairStatus::Deleted {
                    path: file.path.clone(),
                })
            }
        }
    }

    /// Compare the file on disk with its scan snapshot.
    fn check_unchanged(&self, file: &FileEntry) -> Result<(), ActionError> {
        let metadata = fs::metadata(&file.path).map_err(|e| ActionError::from_io(&file.path, e))?;
        if !self.config.verify_unchanged {
            return Ok(());
        }

        if metadata.len() != file.size {
            log::warn!(
                "File modified since scan: {} (size changed from {} to {})",
                file.path.display(),
                file.size,
                metadata.len()
            );
            return Err(ActionError::ModifiedSinceScan(file.path.clone()));
        }
        if let Ok(current) = metadata.modified() {
            if current != file.modified {
                log::warn!(
                    "File modified since scan: {} (mtime changed)",
                    file.path.display()
                );
                return Err(ActionError::ModifiedSinceScan(file.path.clone()));
            }
        }
        Ok(())
    }
}

/// Move a file to the system trash.
fn delete_to_trash(path: &Path) -> Result<(), ActionError> {
    trash::delete(path).map_err(|e| ActionError::Trash {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    log::info!("Moved to trash: {}", path.display());
    Ok(())
}

/// Remove a file permanently.
fn permanent_delete(path: &Path) -> Result<(), ActionError> {
    fs::remove_file(path).map_err(|e| ActionError::from_io(path, e))?;
    log::info!("Permanently deleted: {}", path.display());
    Ok(())
}

/// Group pending pairs into batches that share no file.
///
/// Union-find over normalized path keys, including the path a mark would
/// rename to, so two renames onto one target never race. Each batch keeps
/// slice order.
fn components_by_shared_path(
    pairs: &[DuplicatePair],
    pending: &[usize],
    action: ResolutionAction,
    marker: &str,
) -> Vec<Vec<usize>> {
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut parent: Vec<usize> = (0..pending.len()).collect();
    let mut owner: HashMap<String, usize> = HashMap::new();

    for (slot, &idx) in pending.iter().enumerate() {
        let pair = &pairs[idx];
        let mut touched = vec![pair.canonical.path.clone(), pair.duplicate.path.clone()];
        if let PlannedEffect::Mark { new_path, .. } = plan(pair, action, marker) {
            touched.push(new_path);
        }
        for path in &touched {
            match owner.get(&path_key(path)) {
                Some(&other) => {
                    let a = find(&mut parent, slot);
                    let b = find(&mut parent, other);
                    if a != b {
                        parent[a.max(b)] = a.min(b);
                    }
                }
                None => {
                    owner.insert(path_key(path), slot);
                }
            }
        }
    }

    let mut batches: indexmap::IndexMap<usize, Vec<usize>> = indexmap::IndexMap::new();
    for (slot, &idx) in pending.iter().enumerate() {
        let root = find(&mut parent, slot);
        batches.entry(root).or_default().push(idx);
    }
    batches.into_values().collect()
}
