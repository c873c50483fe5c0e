use model_archivist::actions::{apply_rename, plan_rename};
use model_archivist::catalog::FileStatus;
use model_archivist::classify::Classifier;
use model_archivist::naming::{NameComposer, NamingStyle};
use model_archivist::rules::RuleSet;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn suggest(path: &std::path::Path) -> String {
    let classifier = Classifier::new(Arc::new(RuleSet::builtin().unwrap()));
    let name = path.file_name().unwrap().to_string_lossy();
    let result = classifier.classify(&name);
    NameComposer::new(NamingStyle::default()).compose_file_name(&result, path)
}

#[test]
fn test_classify_then_rename() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("HEX3D_Figure_Pack_v2.zip");
    fs::write(&source, b"archive").unwrap();

    let plan = plan_rename(&source, &suggest(&source));
    let outcome = apply_rename(&plan, false);

    assert_eq!(outcome.status, FileStatus::Renamed);
    assert!(dir.path().join("FIGURE Pack v2 [HEX3D].zip").exists());
    assert!(!source.exists());
}

#[test]
fn test_second_run_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("HEX3D_Figure_Pack_v2.zip");
    fs::write(&source, b"archive").unwrap();
    let first = plan_rename(&source, &suggest(&source));
    apply_rename(&first, false);

    let renamed = first.target.clone();
    let second = plan_rename(&renamed, &suggest(&renamed));
    assert!(second.is_noop());
    assert_eq!(apply_rename(&second, false).status, FileStatus::Skipped);
}

#[test]
fn test_existing_target_is_skipped_without_overwrite() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("a.zip");
    let target = dir.path().join("b.zip");
    fs::write(&source, b"new").unwrap();
    fs::write(&target, b"old").unwrap();

    let plan = plan_rename(&source, "b.zip");
    let outcome = apply_rename(&plan, false);
    assert_eq!(outcome.status, FileStatus::Skipped);
    assert_eq!(fs::read(&target).unwrap(), b"old");

    let outcome = apply_rename(&plan, true);
    assert_eq!(outcome.status, FileStatus::Renamed);
    assert_eq!(fs::read(&target).unwrap(), b"new");
}

#[test]
fn test_missing_source_is_an_error() {
    let dir = TempDir::new().unwrap();
    let plan = plan_rename(&dir.path().join("gone.zip"), "here.zip");
    let outcome = apply_rename(&plan, false);
    assert_eq!(outcome.status, FileStatus::Error);
    assert!(outcome.message.is_some());
}
