use model_archivist::rules::{RuleSet, RuleSetError};
use std::fs;
use tempfile::tempdir;

fn valid_document() -> serde_json::Value {
    serde_json::from_str(include_str!("../../rules/default_rules.json")).unwrap()
}

#[test]
fn test_builtin_rules_are_valid() {
    let rules = RuleSet::builtin().unwrap();
    assert!(rules.category("FIGURE").is_some());
    assert!(rules.special_pattern("BUNDLE").is_some());
}

#[test]
fn test_missing_sections_are_all_reported() {
    let mut doc = valid_document();
    let root = doc.as_object_mut().unwrap();
    root.remove("franchises");
    root.remove("naming_patterns");

    let err = RuleSet::from_value(doc, "broken").unwrap_err();
    let problems = err.problems();
    assert!(problems.iter().any(|p| p.contains("franchises")));
    assert!(problems.iter().any(|p| p.contains("naming_patterns")));
}

#[test]
fn test_bad_priority_and_triggers_are_rejected() {
    let mut doc = valid_document();
    doc["categories"]["BUST"]["priority"] = serde_json::json!("high");
    doc["categories"]["MINI"]["patterns"] = serde_json::json!([1, 2]);

    let err = RuleSet::from_value(doc, "broken").unwrap_err();
    assert!(matches!(err, RuleSetError::Invalid { .. }));
    assert!(err.problems().len() >= 2);
}

#[test]
fn test_bad_regex_fails_at_load() {
    let mut doc = valid_document();
    doc["naming_patterns"]["version"]["regex"] = serde_json::json!("([unclosed");
    assert!(RuleSet::from_value(doc, "broken").is_err());
}

#[test]
fn test_export_then_import_is_pass_through() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("exported.json");

    let rules = RuleSet::builtin().unwrap();
    rules.export_to(&path).unwrap();
    let imported = RuleSet::import_from(&path).unwrap();

    assert_eq!(imported.source_document(), rules.source_document());
    assert_eq!(imported.document(), rules.document());
}

#[test]
fn test_import_rejects_invalid_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{"categories": {}}"#).unwrap();

    let err = RuleSet::import_from(&path).unwrap_err();
    assert_eq!(err.problems().len(), 5);
}

#[test]
fn test_load_or_builtin_without_path() {
    let rules = RuleSet::load_or_builtin(None).unwrap();
    assert_eq!(rules.categories().len(), 8);
}
