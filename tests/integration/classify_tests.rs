use model_archivist::archive::{inspect_or_default, ArchiveContents, FilenameOnlyInspector};
use model_archivist::classify::Classifier;
use model_archivist::naming::{NameComposer, NamingStyle, TagStyle};
use model_archivist::rules::RuleSet;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn rules_with(categories: serde_json::Value, special_patterns: serde_json::Value) -> RuleSet {
    let doc = json!({
        "categories": categories,
        "franchises": {},
        "creators": {
            "HEX3D": { "patterns": ["hex3d"], "always_tag": true, "trusted": true }
        },
        "special_patterns": special_patterns,
        "tag_rules": { "auto_tags": {}, "content_based_tags": {} },
        "naming_patterns": {
            "version": { "regex": "[vV](\\d+(?:\\.\\d+)*)" },
            "technical_specs": { "regex": "\\d+mm" },
            "nsfw_indicators": { "regex": "sfw[_ ]nsfw" }
        }
    });
    RuleSet::from_value(doc, "test rules").unwrap()
}

fn builtin() -> Classifier {
    Classifier::new(Arc::new(RuleSet::builtin().unwrap()))
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn test_figure_pack_with_minimal_rules() {
    let rules = rules_with(
        json!({ "FIGURE": { "patterns": ["figure"], "priority": 5 } }),
        json!({}),
    );
    let result = Classifier::new(Arc::new(rules)).classify("HEX3D_Figure_Pack_v2.zip");

    assert_eq!(result.category, "FIGURE");
    assert_eq!(result.creator.as_deref(), Some("HEX3D"));
    assert_eq!(result.version.as_deref(), Some("2"));
    assert_eq!(result.base_name, "Pack");
    assert!(result.tags.contains("HEX3D"));
}

#[test]
fn test_figure_pack_suggested_file_name() {
    let result = builtin().classify("HEX3D_Figure_Pack_v2.zip");
    let composer = NameComposer::new(NamingStyle::default());

    assert_eq!(composer.compose(&result), "FIGURE Pack v2 [HEX3D]");
    assert_eq!(
        composer.compose_file_name(&result, Path::new("/lib/HEX3D_Figure_Pack_v2.zip")),
        "FIGURE Pack v2 [HEX3D].zip"
    );
}

#[test]
fn test_tag_style_and_prefix_flags() {
    let result = builtin().classify("HEX3D_Figure_Pack_v2.zip");
    let composer = NameComposer::new(
        NamingStyle::default()
            .with_category_prefix(false)
            .with_version_numbers(false)
            .with_tag_style(TagStyle::Parentheses),
    );
    assert_eq!(composer.compose(&result), "Pack (HEX3D)");
}

// ============================================================================
// Category selection
// ============================================================================

#[test]
fn test_priority_tie_breaks_by_name() {
    let rules = rules_with(
        json!({
            "ZETA": { "patterns": ["dragon"], "priority": 3 },
            "ALPHA": { "patterns": ["dragon"], "priority": 3 }
        }),
        json!({}),
    );
    let result = Classifier::new(Arc::new(rules)).classify("Red_Dragon.zip");
    assert_eq!(result.category, "ALPHA");
}

#[test]
fn test_higher_priority_wins() {
    let result = builtin().classify("Dragon_Bust_Figure.zip");
    assert_eq!(result.category, "BUST");
}

#[test]
fn test_override_beats_higher_priority() {
    let rules = rules_with(
        json!({ "BUST": { "patterns": ["bust"], "priority": 99 } }),
        json!({
            "NOPE": { "patterns": ["bust"], "override_category": false },
            "BUNDLE": { "patterns": ["bundle"], "override_category": true },
            "PATREON": { "patterns": ["patreon"], "override_category": true }
        }),
    );
    let result = Classifier::new(Arc::new(rules)).classify("Patreon_Bust_Bundle.zip");

    assert_eq!(result.category, "BUNDLE");
    assert!(result.priority_override);
}

#[test]
fn test_unmatched_name_uses_default_category() {
    let classifier = builtin().with_default_category("INBOX");
    assert_eq!(classifier.classify("qwerty.zip").category, "INBOX");
}

// ============================================================================
// Archive contents
// ============================================================================

#[test]
fn test_unsupported_source_falls_back_to_name() {
    let contents = inspect_or_default(&FilenameOnlyInspector, Path::new("/lib/Orc.rar"));
    assert_eq!(contents, ArchiveContents::default());

    let classifier = builtin();
    assert_eq!(
        classifier.classify_with_contents("Orc_Bust.rar", Some(&contents)),
        classifier.classify("Orc_Bust.rar")
    );
}

#[test]
fn test_content_flags_add_tags() {
    let contents = ArchiveContents::from_entries(["orc/orc.stl", "orc/readme.txt", "orc.lys"]);
    let result = builtin().classify_with_contents("Orc_Bust.zip", Some(&contents));

    assert!(result.tags.contains("STL"));
    assert!(result.tags.contains("DOCUMENTED"));
    assert!(result.tags.contains("LYCHEE"));
}

#[test]
fn test_classifier_is_shareable_across_threads() {
    let classifier = Arc::new(builtin());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let classifier = Arc::clone(&classifier);
            std::thread::spawn(move || classifier.classify("HEX3D_Figure_Pack_v2.zip"))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}
