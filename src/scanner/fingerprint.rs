//! Two-tier content identity.
//!
//! # Overview
//!
//! A *quick* fingerprint hashes at most two 1 MiB samples (head, and tail when
//! the file is larger than 2 MiB) with XXH64 under two seeds, giving a 128-bit
//! value that is cheap to compute and only ever used to bucket candidates. A
//! *full* fingerprint streams the whole file through a 256-bit cryptographic
//! digest (SHA-256 by default, BLAKE3 optionally) and is what confirms a
//! duplicate.
//!
//! Both return `None` instead of failing: an unreadable file simply has no
//! identity and takes no part in duplicate detection. The `try_*` variants
//! expose the underlying [`HashError`] for callers that want it.

use std::fs::File;
use std::hash::Hasher as _;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use twox_hash::XxHash64;

use super::HashError;

/// Bytes sampled from each end of a file for the quick fingerprint.
pub const SAMPLE_SIZE: u64 = 1024 * 1024;

const BUFFER_SIZE: usize = 64 * 1024;
const SEEDS: [u64; 2] = [0, 0x9E37_79B9_7F4A_7C15];

/// 128-bit quick fingerprint.
pub type QuickDigest = [u8; 16];

/// 256-bit full-content digest.
pub type FullDigest = [u8; 32];

/// Cryptographic digest used for full fingerprints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

/// Quick and full fingerprints of one file, either of which may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentFingerprint {
    pub quick: Option<QuickDigest>,
    pub full: Option<FullDigest>,
}

impl ContentFingerprint {
    #[must_use]
    pub fn quick_hex(&self) -> Option<String> {
        self.quick.as_ref().map(|d| digest_to_hex(d))
    }

    #[must_use]
    pub fn full_hex(&self) -> Option<String> {
        self.full.as_ref().map(|d| digest_to_hex(d))
    }
}

/// Computes fingerprints and counts how many full reads it performed.
#[derive(Debug, Default)]
pub struct Fingerprinter {
    algorithm: DigestAlgorithm,
    full_reads: AtomicUsize,
}

impl Fingerprinter {
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            full_reads: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Number of full-content digests started so far.
    #[must_use]
    pub fn full_reads(&self) -> usize {
        self.full_reads.load(Ordering::Relaxed)
    }

    /// Quick fingerprint, or `None` if the file is empty or unreadable.
    #[must_use]
    pub fn quick_fingerprint(&self, path: &Path) -> Option<QuickDigest> {
        match self.try_quick_fingerprint(path) {
            Ok(digest) => digest,
            Err(e) => {
                log::debug!("Quick fingerprint failed: {}", e);
                None
            }
        }
    }

    /// Quick fingerprint with the read error exposed.
    ///
    /// Returns `Ok(None)` for empty files.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn try_quick_fingerprint(&self, path: &Path) -> Result<Option<QuickDigest>, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();
        if size == 0 {
            return Ok(None);
        }

        let mut hashers = SEEDS.map(XxHash64::with_seed);
        let mut buffer = vec![0u8; BUFFER_SIZE];

        feed_sample(&mut file, &mut hashers, &mut buffer, SAMPLE_SIZE)
            .map_err(|e| HashError::from_io(path, e))?;

        if size > 2 * SAMPLE_SIZE {
            file.seek(SeekFrom::End(-(SAMPLE_SIZE as i64)))
                .map_err(|e| HashError::from_io(path, e))?;
            feed_sample(&mut file, &mut hashers, &mut buffer, SAMPLE_SIZE)
                .map_err(|e| HashError::from_io(path, e))?;
        }

        let mut digest = [0u8; 16];
        digest[..8].copy_from_slice(&hashers[0].finish().to_be_bytes());
        digest[8..].copy_from_slice(&hashers[1].finish().to_be_bytes());
        Ok(Some(digest))
    }

    /// Full-content digest, or `None` if the file cannot be read.
    ///
    /// An empty file yields the digest of empty input.
    #[must_use]
    pub fn full_fingerprint(&self, path: &Path) -> Option<FullDigest> {
        match self.try_full_fingerprint(path) {
            Ok(digest) => Some(digest),
            Err(e) => {
                log::debug!("Full fingerprint failed: {}", e);
                None
            }
        }
    }

    /// Full-content digest with the read error exposed.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn try_full_fingerprint(&self, path: &Path) -> Result<FullDigest, HashError> {
        self.full_reads.fetch_add(1, Ordering::Relaxed);
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        match self.algorithm {
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                stream(file, |chunk| hasher.update(chunk))
                    .map_err(|e| HashError::from_io(path, e))?;
                let mut digest = [0u8; 32];
                digest.copy_from_slice(&hasher.finalize());
                Ok(digest)
            }
            DigestAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                stream(file, |chunk| {
                    hasher.update(chunk);
                })
                .map_err(|e| HashError::from_io(path, e))?;
                Ok(*hasher.finalize().as_bytes())
            }
        }
    }

    /// Both fingerprints. The full digest is only computed when a quick
    /// fingerprint exists.
    #[must_use]
    pub fn fingerprint(&self, path: &Path) -> ContentFingerprint {
        let quick = self.quick_fingerprint(path);
        let full = quick.and_then(|_| self.full_fingerprint(path));
        ContentFingerprint { quick, full }
    }

    /// True iff both quick and full fingerprints exist and match.
    ///
    /// Never reads full content when the quick fingerprints differ.
    #[must_use]
    pub fn identical(&self, a: &Path, b: &Path) -> bool {
        let (Some(qa), Some(qb)) = (self.quick_fingerprint(a), self.quick_fingerprint(b)) else {
            return false;
        };
        if qa != qb {
            return false;
        }
        match (self.full_fingerprint(a), self.full_fingerprint(b)) {
            (Some(fa), Some(fb)) => fa == fb,
            _ => false,
        }
    }
}

fn feed_sample(
    file: &mut File,
    hashers: &mut [XxHash64; 2],
    buffer: &mut [u8],
    limit: u64,
) -> std::io::Result<()> {
    let mut reader = file.take(limit);
    loop {
        let n = reader.read(buffer)?;
        if n == 0 {
            return Ok(());
        }
        for hasher in hashers.iter_mut() {
            hasher.write(&buffer[..n]);
        }
    }
}

fn stream(mut file: File, mut update: impl FnMut(&[u8])) -> std::io::Result<()> {
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let n = match file.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        update(&buffer[..n]);
    }
}

/// Lowercase hex rendering of a digest.
#[must_use]
pub fn digest_to_hex(digest: &[u8]) -> String {
    use std::fmt::Write;

    digest.iter().fold(String::with_capacity(digest.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}
