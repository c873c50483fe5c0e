//! Confirmed duplicate groups and the pairs derived from them.
//!
//! A [`DuplicateGroup`] holds files with the same full-content digest in
//! first-seen order. Its first member is canonical; every later member forms
//! a [`DuplicatePair`] with it. Pairs carry a resolution status that starts
//! as [`PairStatus::Pending`] and moves to exactly one terminal state when an
//! action is applied.

use std::hash::Hash;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::scanner::{digest_to_hex, FileEntry, FullDigest};

/// Why two files were paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Same quick fingerprint and same full digest
    IdenticalContent,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdenticalContent => f.write_str("identical content"),
        }
    }
}

/// Resolution state of one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PairStatus {
    Pending,
    /// Both files left untouched
    Kept,
    /// The chosen file was renamed with the duplicate marker
    Marked { new_path: PathBuf },
    /// The chosen file was removed
    Deleted { path: PathBuf },
    /// The action could not be completed
    Error { reason: String },
}

impl PairStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Short label for reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Kept => "Kept",
            Self::Marked { .. } => "Marked",
            Self::Deleted { .. } => "Deleted",
            Self::Error { .. } => "Error",
        }
    }
}

/// Two files with identical content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicatePair {
    /// First-seen member of the group
    pub canonical: FileEntry,
    pub duplicate: FileEntry,
    pub match_type: MatchType,
    pub status: PairStatus,
}

impl DuplicatePair {
    #[must_use]
    pub fn new(canonical: FileEntry, duplicate: FileEntry) -> Self {
        Self {
            canonical,
            duplicate,
            match_type: MatchType::IdenticalContent,
            status: PairStatus::Pending,
        }
    }
}

/// Files sharing one full-content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub digest: FullDigest,
    /// Members in first-seen order; never fewer than two
    pub files: Vec<FileEntry>,
}

impl DuplicateGroup {
    #[must_use]
    pub fn new(digest: FullDigest, files: Vec<FileEntry>) -> Self {
        Self { digest, files }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn canonical(&self) -> Option<&FileEntry> {
        self.files.first()
    }

    /// Bytes held by every copy after the first.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.files.iter().skip(1).map(|f| f.size).sum()
    }

    #[must_use]
    pub fn digest_hex(&self) -> String {
        digest_to_hex(&self.digest)
    }

    /// Pair the canonical member with each later member.
    #[must_use]
    pub fn pairs(&self) -> Vec<DuplicatePair> {
        let Some((canonical, rest)) = self.files.split_first() else {
            return Vec::new();
        };
        rest.iter()
            .map(|dup| DuplicatePair::new(canonical.clone(), dup.clone()))
            .collect()
    }
}

/// Bucket keyed items, keeping buckets and members in first-seen order.
#[must_use]
pub fn bucket_in_order<K, T>(items: impl IntoIterator<Item = (K, T)>) -> IndexMap<K, Vec<T>>
where
    K: Hash + Eq,
{
    let mut buckets: IndexMap<K, Vec<T>> = IndexMap::new();
    for (key, item) in items {
        buckets.entry(key).or_default().push(item);
    }
    buckets
}

/// Flatten groups into pairs, group by group.
#[must_use]
pub fn pairs_from_groups(groups: &[DuplicateGroup]) -> Vec<DuplicatePair> {
    groups.iter().flat_map(DuplicateGroup::pairs).collect()
}
