//! Two-pass duplicate detection.
//!
//! # Overview
//!
//! 0. **Alias removal** - entries that name a file already seen (the same
//!    path twice, a symlink, a hardlink) are dropped so a file is never
//!    paired with itself.
//! 1. **Fingerprint** - quick fingerprints for every candidate, computed in
//!    parallel on a bounded pool. Files without one (empty or unreadable)
//!    drop out here and are never reported as duplicates of anything.
//! 2. **Verify** - for each quick-fingerprint bucket with two or more
//!    members, full digests are computed and the bucket is split by digest.
//!    Every digest bucket with two or more members becomes a
//!    [`DuplicateGroup`].
//!
//! Pass 1 finishes completely before pass 2 starts, since bucketing is
//! file-set-wide. Cancellation is checked between files, never mid-hash.
//!
//! # Example
//!
//! ```no_run
//! use model_archivist::duplicates::{DuplicateFinder, FinderConfig};
//! use model_archivist::scanner::FileEntry;
//! use std::path::Path;
//!
//! let files = vec![
//!     FileEntry::from_path(Path::new("a.zip")).unwrap(),
//!     FileEntry::from_path(Path::new("b.zip")).unwrap(),
//! ];
//! let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(4));
//! let (groups, summary) = finder.find_duplicates(files).unwrap();
//! println!("{} groups, {} reclaimable", groups.len(), summary.reclaimable_display());
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use rayon::prelude::*;

use super::groups::{bucket_in_order, DuplicateGroup};
use crate::progress::ProgressCallback;
use crate::scanner::identity::retain_distinct;
use crate::scanner::{DigestAlgorithm, FileEntry, Fingerprinter, FullDigest, QuickDigest};

/// Configuration for [`DuplicateFinder`].
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of I/O threads for parallel hashing.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Digest used to confirm duplicates
    pub algorithm: DigestAlgorithm,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("io_threads", &self.io_threads)
            .field("algorithm", &self.algorithm)
            .field("shutdown_flag", &self.shutdown_flag.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            algorithm: DigestAlgorithm::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the number of I/O threads (minimum 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Statistics from one duplicate scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Candidates handed to the finder
    pub total_files: usize,
    /// Candidates dropped because they name a file already in the set
    pub aliases_skipped: usize,
    pub total_size: u64,
    /// Candidates without a quick fingerprint (empty or unreadable)
    pub unfingerprinted: usize,
    /// Candidates that shared a quick fingerprint with another file
    pub quick_collisions: usize,
    /// Candidates whose full digest could not be computed
    pub unverified: usize,
    pub duplicate_groups: usize,
    /// Duplicate files, not counting each group's canonical member
    pub duplicate_files: usize,
    pub reclaimable_space: u64,
    /// Full-content digests computed during the scan
    pub full_reads: usize,
    pub scan_duration: Duration,
}

impl ScanSummary {
    /// Format reclaimable space as human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize::b(self.reclaimable_space).to_string()
    }

    /// Format total size as human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        ByteSize::b(self.total_size).to_string()
    }
}

/// Errors that can occur during duplicate finding.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Runs the two-pass duplicate detection pipeline.
pub struct DuplicateFinder {
    config: FinderConfig,
    fingerprinter: Arc<Fingerprinter>,
}

impl DuplicateFinder {
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let fingerprinter = Arc::new(Fingerprinter::new(config.algorithm));
        Self {
            config,
            fingerprinter,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    #[must_use]
    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Find confirmed duplicates among `files`.
    ///
    /// Input order matters: within a group, the earliest file is canonical,
    /// and groups are returned in the order of their canonical members.
    /// Entries naming a file already in the input are dropped first.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Interrupted`] if the shutdown flag was raised
    /// and [`FinderError::Pool`] if no worker pool could be created.
    pub fn find_duplicates(
        &self,
        files: Vec<FileEntry>,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start = Instant::now();
        let (files, aliases_skipped) = retain_distinct(files);
        if aliases_skipped > 0 {
            log::info!("Skipped {} entries naming an already listed file", aliases_skipped);
        }
        let mut summary = ScanSummary {
            total_files: files.len(),
            total_size: files.iter().map(|f| f.size).sum(),
            aliases_skipped,
            ..Default::default()
        };
        let reads_before = self.fingerprinter.full_reads();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .build()?;

        // Pass 1: quick fingerprints for everything
        let indexed: Vec<(usize, FileEntry)> = files.into_iter().enumerate().collect();
        let quick = self.run_phase(&pool, "fingerprint", indexed, |fp, file| {
            fp.quick_fingerprint(&file.path)
        })?;

        let mut with_quick: Vec<(QuickDigest, (usize, FileEntry))> = Vec::new();
        for (idx, file, digest) in quick {
            match digest {
                Some(d) => with_quick.push((d, (idx, file))),
                None => summary.unfingerprinted += 1,
            }
        }
        let quick_buckets = bucket_in_order(with_quick);

        let collisions: Vec<(usize, FileEntry)> = quick_buckets
            .into_values()
            .filter(|bucket| bucket.len() > 1)
            .flatten()
            .collect();
        summary.quick_collisions = collisions.len();
        log::info!(
            "Pass 1 complete: {} files, {} share a quick fingerprint",
            summary.total_files,
            summary.quick_collisions
        );

        // Pass 2: full digests for quick-fingerprint collisions only
        let full = self.run_phase(&pool, "verify", collisions, |fp, file| {
            fp.full_fingerprint(&file.path)
        })?;

        let mut with_full: Vec<(FullDigest, (usize, FileEntry))> = Vec::new();
        for (idx, file, digest) in full {
            match digest {
                Some(d) => with_full.push((d, (idx, file))),
                None => summary.unverified += 1,
            }
        }

        let mut groups: Vec<(usize, DuplicateGroup)> = bucket_in_order(with_full)
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(digest, mut members)| {
                members.sort_by_key(|(idx, _)| *idx);
                let first = members[0].0;
                let files = members.into_iter().map(|(_, f)| f).collect();
                (first, DuplicateGroup::new(digest, files))
            })
            .collect();
        groups.sort_by_key(|(first, _)| *first);
        let groups: Vec<DuplicateGroup> = groups.into_iter().map(|(_, g)| g).collect();

        summary.duplicate_groups = groups.len();
        summary.duplicate_files = groups.iter().map(|g| g.len() - 1).sum();
        summary.reclaimable_space = groups.iter().map(DuplicateGroup::wasted_space).sum();
        summary.full_reads = self.fingerprinter.full_reads() - reads_before;
        summary.scan_duration = start.elapsed();

        log::info!(
            "Scan complete: {} duplicate groups, {} reclaimable",
            summary.duplicate_groups,
            summary.reclaimable_display()
        );

        Ok((groups, summary))
    }

    /// Fingerprint `items` in parallel, reporting "done / total" progress.
    ///
    /// Results come back in input order.
    fn run_phase<D, F>(
        &self,
        pool: &rayon::ThreadPool,
        phase: &str,
        items: Vec<(usize, FileEntry)>,
        compute: F,
    ) -> Result<Vec<(usize, FileEntry, Option<D>)>, FinderError>
    where
        D: Send,
        F: Fn(&Fingerprinter, &FileEntry) -> Option<D> + Sync,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let callback = self.config.progress_callback.as_ref();
        if let Some(cb) = callback {
            cb.on_phase_start(phase, items.len());
        }
        log::debug!("{}: {} files", phase, items.len());

        let done = AtomicUsize::new(0);
        let fingerprinter = &self.fingerprinter;
        let results: Vec<Option<(usize, FileEntry, Option<D>)>> = pool.install(|| {
            items
                .into_par_iter()
                .map(|(idx, file)| {
                    if self.config.is_shutdown_requested() {
                        return None;
                    }
                    let digest = compute(fingerprinter, &file);
                    if digest.is_none() {
                        log::warn!("Excluded from duplicate detection: {}", file.path.display());
                    }
                    let current = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(cb) = callback {
                        cb.on_progress(current, file.path.to_string_lossy().as_ref());
                        cb.on_item_completed(file.size);
                    }
                    Some((idx, file, digest))
                })
                .collect()
        });

        if let Some(cb) = callback {
            cb.on_phase_end(phase);
        }

        if self.config.is_shutdown_requested() {
            log::info!("{}: Interrupted by shutdown signal", phase);
            return Err(FinderError::Interrupted);
        }

        Ok(results.into_iter().flatten().collect())
    }
}
