use model_archivist::catalog::{CatalogSink, FileRecord, FileStatus, SqliteCatalog};
use model_archivist::classify::Classifier;
use model_archivist::rules::RuleSet;
use model_archivist::scanner::{DigestAlgorithm, Fingerprinter};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_catalog_survives_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nested").join("catalog.db");
    let file = dir.path().join("HEX3D_Figure_Pack_v2.zip");
    fs::write(&file, b"archive bytes").unwrap();

    let classifier = Classifier::new(Arc::new(RuleSet::builtin().unwrap()));
    let result = classifier.classify("HEX3D_Figure_Pack_v2.zip");
    let fingerprint = Fingerprinter::new(DigestAlgorithm::Sha256).fingerprint(&file);

    {
        let catalog = SqliteCatalog::open(&db).unwrap();
        let record = FileRecord::new(&file)
            .with_fingerprint(&fingerprint)
            .with_classification(result.clone(), "FIGURE Pack v2 [HEX3D]");
        catalog.record(&record).unwrap();
    }

    let catalog = SqliteCatalog::open(&db).unwrap();
    assert_eq!(catalog.count().unwrap(), 1);
    let stored = catalog.get(&file).unwrap().unwrap();
    assert_eq!(stored.status, FileStatus::Pending);
    assert_eq!(stored.suggested_name.as_deref(), Some("FIGURE Pack v2 [HEX3D]"));
    assert_eq!(catalog.classification(&file).unwrap(), Some(result));

    let full = fingerprint.full_hex().unwrap();
    assert_eq!(catalog.find_by_full_fingerprint(&full).unwrap().len(), 1);
}

#[test]
fn test_status_update_after_rename() {
    let catalog = SqliteCatalog::open_in_memory().unwrap();
    let path = std::path::Path::new("/lib/Orc_Bust.zip");
    catalog.record(&FileRecord::new(path)).unwrap();

    let updated = catalog
        .update_status(path, Some("BUST Orc.zip"), FileStatus::Renamed)
        .unwrap();
    assert!(updated);

    let stored = catalog.get(path).unwrap().unwrap();
    assert_eq!(stored.status, FileStatus::Renamed);
    assert_eq!(stored.new_name.as_deref(), Some("BUST Orc.zip"));

    let missing = catalog
        .update_status(std::path::Path::new("/lib/nope.zip"), None, FileStatus::Error)
        .unwrap();
    assert!(!missing);
}

#[test]
fn test_catalog_is_usable_as_trait_object() {
    let catalog = SqliteCatalog::open_in_memory().unwrap();
    let sink: &dyn CatalogSink = &catalog;
    let id = sink
        .record(&FileRecord::new(std::path::Path::new("/lib/a.zip")))
        .unwrap();
    let again = sink
        .record(
            &FileRecord::new(std::path::Path::new("/lib/a.zip"))
                .with_status(FileStatus::Skipped, None),
        )
        .unwrap();
    assert_eq!(id, again);
    assert_eq!(catalog.count().unwrap(), 1);
}
