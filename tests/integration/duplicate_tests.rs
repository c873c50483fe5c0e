use filetime::{set_file_mtime, FileTime};
use model_archivist::actions::{ResolutionAction, ResolveConfig, Resolver};
use model_archivist::duplicates::{
    pairs_from_groups, DuplicateFinder, FinderConfig, FinderError, PairStatus,
};
use model_archivist::scanner::walker::collect_candidates;
use model_archivist::scanner::{DigestAlgorithm, FileEntry, Fingerprinter, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

const MIB: usize = 1024 * 1024;

fn write(dir: &Path, name: &str, content: &[u8]) -> FileEntry {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    FileEntry::from_path(&path).unwrap()
}

fn write_aged(dir: &Path, name: &str, content: &[u8], unix_secs: i64) -> FileEntry {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(unix_secs, 0)).unwrap();
    FileEntry::from_path(&path).unwrap()
}

// ============================================================================
// Detection
// ============================================================================

#[test]
fn test_same_sample_different_middle_is_not_a_duplicate() {
    let dir = TempDir::new().unwrap();
    let base = vec![7u8; 3 * MIB];
    let mut changed = base.clone();
    changed[MIB + MIB / 2] = 8;

    let files = vec![
        write(dir.path(), "a.zip", &base),
        write(dir.path(), "b.zip", &base),
        write(dir.path(), "c.zip", &changed),
    ];

    let finder = DuplicateFinder::with_defaults();
    let (groups, summary) = finder.find_duplicates(files).unwrap();

    assert_eq!(groups.len(), 1);
    let pairs = groups[0].pairs();
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].canonical.path.ends_with("a.zip"));
    assert!(pairs[0].duplicate.path.ends_with("b.zip"));
    assert_eq!(summary.quick_collisions, 3);
    assert_eq!(summary.full_reads, 3);
}

#[test]
fn test_empty_files_are_never_duplicates() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(dir.path(), "empty1.zip", b""),
        write(dir.path(), "empty2.zip", b""),
    ];
    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(files)
        .unwrap();
    assert!(groups.is_empty());
    assert_eq!(summary.unfingerprinted, 2);
}

#[test]
fn test_unreadable_files_are_excluded() {
    let dir = TempDir::new().unwrap();
    let real = write(dir.path(), "real.zip", b"payload");
    let ghost = FileEntry::new(dir.path().join("ghost.zip"), 7, real.modified);

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(vec![real, ghost])
        .unwrap();
    assert!(groups.is_empty());
    assert_eq!(summary.unfingerprinted, 1);
}

#[test]
fn test_groups_follow_first_seen_order() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(dir.path(), "x1.zip", b"second group"),
        write(dir.path(), "y1.zip", b"first group?"),
        write(dir.path(), "y2.zip", b"first group?"),
        write(dir.path(), "x2.zip", b"second group"),
    ];
    let (groups, _) = DuplicateFinder::new(FinderConfig::default().with_io_threads(3))
        .find_duplicates(files)
        .unwrap();

    assert_eq!(groups.len(), 2);
    assert!(groups[0].files[0].path.ends_with("x1.zip"));
    assert!(groups[1].files[0].path.ends_with("y1.zip"));
}

#[test]
fn test_blake3_finds_the_same_groups() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(dir.path(), "a.zip", b"same"),
        write(dir.path(), "b.zip", b"same"),
    ];
    let finder = DuplicateFinder::new(FinderConfig::default().with_algorithm(DigestAlgorithm::Blake3));
    let (groups, _) = finder.find_duplicates(files).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].digest, *blake3::hash(b"same").as_bytes());
}

#[test]
fn test_shutdown_flag_interrupts() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write(dir.path(), "a.zip", b"same"),
        write(dir.path(), "b.zip", b"same"),
    ];
    let finder = DuplicateFinder::new(
        FinderConfig::default().with_shutdown_flag(Arc::new(AtomicBool::new(true))),
    );
    assert!(matches!(
        finder.find_duplicates(files),
        Err(FinderError::Interrupted)
    ));
}

#[test]
fn test_collect_candidates_filters_extensions() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.zip", b"1");
    write(dir.path(), "b.STL", b"2");
    fs::create_dir(dir.path().join("nested")).unwrap();
    write(&dir.path().join("nested"), "c.7z", b"3");

    let config = WalkerConfig::default().with_extensions(vec!["zip".into(), "7z".into()]);
    let (files, errors) = collect_candidates(&[dir.path().to_path_buf()], &config, None);

    assert!(errors.is_empty());
    let mut names: Vec<String> = files
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.zip", "c.7z"]);
}

#[test]
fn test_identical_never_reads_full_content_on_quick_mismatch() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.zip", b"aaaa");
    let b = write(dir.path(), "b.zip", b"bbbb");

    let fingerprinter = Fingerprinter::new(DigestAlgorithm::Sha256);
    assert!(!fingerprinter.identical(&a.path, &b.path));
    assert!(!fingerprinter.identical(&b.path, &a.path));
    assert_eq!(fingerprinter.full_reads(), 0);
}

// ============================================================================
// Resolution
// ============================================================================

fn scan_pairs(files: Vec<FileEntry>) -> Vec<model_archivist::duplicates::DuplicatePair> {
    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(files)
        .unwrap();
    pairs_from_groups(&groups)
}

#[test]
fn test_mark_newer_renames_newer_copy() {
    let dir = TempDir::new().unwrap();
    let old = write_aged(dir.path(), "Orc.zip", b"orc", 1_000_000);
    let new = write_aged(dir.path(), "Orc (1).zip", b"orc", 2_000_000);
    let mut pairs = scan_pairs(vec![old, new]);

    let report = Resolver::default()
        .apply(&mut pairs, ResolutionAction::MarkNewerAsDupe)
        .unwrap();

    let marked = dir.path().join("Orc (1)_DUPE.zip");
    assert_eq!(pairs[0].status, PairStatus::Marked { new_path: marked.clone() });
    assert!(marked.exists());
    assert!(dir.path().join("Orc.zip").exists());
    assert_eq!(report.marked, 1);
}

#[test]
fn test_mark_older_with_custom_marker() {
    let dir = TempDir::new().unwrap();
    let old = write_aged(dir.path(), "Orc.zip", b"orc", 1_000_000);
    let new = write_aged(dir.path(), "Orc (1).zip", b"orc", 2_000_000);
    let mut pairs = scan_pairs(vec![new, old]);

    Resolver::new(ResolveConfig::default().with_marker(".copy"))
        .apply(&mut pairs, ResolutionAction::MarkOlderAsDupe)
        .unwrap();

    assert!(dir.path().join("Orc.copy.zip").exists());
    assert!(dir.path().join("Orc (1).zip").exists());
}

#[test]
fn test_delete_older_permanently() {
    let dir = TempDir::new().unwrap();
    let old = write_aged(dir.path(), "a.zip", b"payload", 1_000_000);
    let new = write_aged(dir.path(), "b.zip", b"payload", 2_000_000);
    let mut pairs = scan_pairs(vec![new, old]);

    let report = Resolver::new(ResolveConfig::default().with_permanent(true))
        .apply(&mut pairs, ResolutionAction::DeleteOlder)
        .unwrap();

    assert!(!dir.path().join("a.zip").exists());
    assert!(dir.path().join("b.zip").exists());
    assert_eq!(report.deleted, 1);
    assert_eq!(report.bytes_freed, 7);
}

#[test]
fn test_same_file_listed_twice_is_never_deleted() {
    let dir = TempDir::new().unwrap();
    let entry = write(dir.path(), "pack.zip", b"only copy");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(vec![entry.clone(), entry])
        .unwrap();
    assert!(groups.is_empty());
    assert_eq!(summary.aliases_skipped, 1);
    assert_eq!(summary.total_files, 1);

    let mut pairs = pairs_from_groups(&groups);
    let report = Resolver::new(ResolveConfig::default().with_permanent(true))
        .apply(&mut pairs, ResolutionAction::DeleteOlder)
        .unwrap();
    assert_eq!(report.deleted, 0);
    assert!(dir.path().join("pack.zip").exists());
}

#[test]
fn test_directory_plus_inner_file_is_one_candidate() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "pack.zip", b"only copy");
    let inputs = vec![dir.path().to_path_buf(), dir.path().join("pack.zip")];

    let (files, errors) = collect_candidates(&inputs, &WalkerConfig::default(), None);
    assert_eq!(files.len(), 1);
    assert!(errors.is_empty());

    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(files)
        .unwrap();
    assert!(groups.is_empty());
}

#[cfg(unix)]
#[test]
fn test_hardlinks_are_not_duplicates() {
    let dir = TempDir::new().unwrap();
    let original = write(dir.path(), "a.zip", b"linked");
    fs::hard_link(&original.path, dir.path().join("b.zip")).unwrap();
    let link = FileEntry::from_path(&dir.path().join("b.zip")).unwrap();
    let copy = write(dir.path(), "c.zip", b"linked");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(vec![original, link, copy])
        .unwrap();

    assert_eq!(summary.aliases_skipped, 1);
    assert_eq!(groups.len(), 1);
    let pairs = groups[0].pairs();
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].canonical.path.ends_with("a.zip"));
    assert!(pairs[0].duplicate.path.ends_with("c.zip"));
}

#[test]
fn test_keep_both_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.zip", b"same");
    let b = write(dir.path(), "b.zip", b"same");
    let mut pairs = scan_pairs(vec![a, b]);

    let report = Resolver::default()
        .apply(&mut pairs, ResolutionAction::KeepBoth)
        .unwrap();
    assert_eq!(pairs[0].status, PairStatus::Kept);
    assert_eq!(report.kept, 1);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn test_failed_pair_does_not_stop_batch() {
    let dir = TempDir::new().unwrap();
    let a1 = write_aged(dir.path(), "a1.zip", b"first", 1_000_000);
    let a2 = write_aged(dir.path(), "a2.zip", b"first", 2_000_000);
    let b1 = write_aged(dir.path(), "b1.zip", b"second", 1_000_000);
    let b2 = write_aged(dir.path(), "b2.zip", b"second", 2_000_000);
    let mut pairs = scan_pairs(vec![a1, a2, b1, b2]);
    assert_eq!(pairs.len(), 2);

    fs::remove_file(dir.path().join("a2.zip")).unwrap();

    let report = Resolver::new(ResolveConfig::default().with_permanent(true))
        .apply(&mut pairs, ResolutionAction::DeleteNewer)
        .unwrap();

    assert!(pairs[0].status.is_error());
    assert_eq!(
        pairs[1].status,
        PairStatus::Deleted {
            path: dir.path().join("b2.zip")
        }
    );
    assert_eq!(report.errors, 1);
    assert_eq!(report.deleted, 1);
}

#[test]
fn test_modified_since_scan_is_refused() {
    let dir = TempDir::new().unwrap();
    let a = write_aged(dir.path(), "a.zip", b"same", 1_000_000);
    let b = write_aged(dir.path(), "b.zip", b"same", 2_000_000);
    let mut pairs = scan_pairs(vec![a, b]);

    set_file_mtime(
        dir.path().join("b.zip"),
        FileTime::from_unix_time(3_000_000, 0),
    )
    .unwrap();

    Resolver::default()
        .apply(&mut pairs, ResolutionAction::MarkNewerAsDupe)
        .unwrap();
    assert!(pairs[0].status.is_error());
    assert!(dir.path().join("b.zip").exists());
}

#[test]
fn test_applied_pairs_are_not_reapplied() {
    let dir = TempDir::new().unwrap();
    let a = write_aged(dir.path(), "a.zip", b"same", 1_000_000);
    let b = write_aged(dir.path(), "b.zip", b"same", 2_000_000);
    let mut pairs = scan_pairs(vec![a, b]);
    let resolver = Resolver::default();

    resolver
        .apply(&mut pairs, ResolutionAction::MarkNewerAsDupe)
        .unwrap();
    let second = resolver
        .apply(&mut pairs, ResolutionAction::MarkNewerAsDupe)
        .unwrap();

    assert_eq!(second.applied, 0);
    assert_eq!(second.skipped, 1);
    assert!(!dir.path().join("b_DUPE_DUPE.zip").exists());
}

#[test]
fn test_pairs_sharing_canonical_run_in_order() {
    let dir = TempDir::new().unwrap();
    let canon = write_aged(dir.path(), "orig.zip", b"x", 1_000_000);
    let copies: Vec<FileEntry> = (1..=3)
        .map(|i| write_aged(dir.path(), &format!("copy{}.zip", i), b"x", 2_000_000 + i))
        .collect();
    let mut files = vec![canon];
    files.extend(copies);
    let mut pairs = scan_pairs(files);
    assert_eq!(pairs.len(), 3);

    Resolver::new(ResolveConfig::default().with_io_threads(4))
        .apply(&mut pairs, ResolutionAction::MarkNewerAsDupe)
        .unwrap();

    for i in 1..=3 {
        let expected: PathBuf = dir.path().join(format!("copy{}_DUPE.zip", i));
        assert!(expected.exists());
    }
    assert!(dir.path().join("orig.zip").exists());
}
