//! Filename classification.
//!
//! [`Classifier`] turns a file name into a [`ClassificationResult`]: one
//! category, an optional franchise and creator, version, technical specs, a
//! tag set and NSFW flags. It is a pure function of the name, the shared
//! [`RuleSet`] and optional archive contents, so it can be called from any
//! number of threads at once.
//!
//! # Decision order
//!
//! 1. Matching categories are ranked by priority, ties by name.
//! 2. The first special pattern (declaration order) with
//!    `override_category` replaces the ranked category.
//! 3. Otherwise the top-ranked category is used, or the default category
//!    (`MISC`) when nothing matched.
//! 4. The first matching franchise is attached and its related categories
//!    become tags (except the chosen category itself).
//! 5. Every matching `always_tag` creator is tagged; the first one is
//!    recorded as the creator.
//! 6. Version, technical specs, auto tags and NSFW status come straight from
//!    the match report.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use model_archivist::classify::Classifier;
//! use model_archivist::rules::RuleSet;
//!
//! let classifier = Classifier::new(Arc::new(RuleSet::builtin().unwrap()));
//! let result = classifier.classify("HEX3D_Figure_Pack_v2.zip");
//! assert_eq!(result.category, "FIGURE");
//! assert_eq!(result.creator.as_deref(), Some("HEX3D"));
//! assert_eq!(result.version.as_deref(), Some("2"));
//! assert_eq!(result.base_name, "Pack");
//! ```

pub mod matcher;

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::archive::ArchiveContents;
use crate::rules::{RuleSet, TriggerSet};
use crate::scanner::path_utils::normalize_path_str_cow;

pub use matcher::{
    match_rules, CategoryMatch, CreatorMatch, FranchiseMatch, NsfwStatus, RuleMatches,
    SpecialPatternMatch,
};

/// Category used when no rule matches.
pub const DEFAULT_CATEGORY: &str = "MISC";

/// Outcome of classifying one file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub original_name: String,
    /// Stem with version, technical specs and creator triggers removed
    pub base_name: String,
    pub category: String,
    pub franchise: Option<String>,
    pub creator: Option<String>,
    pub version: Option<String>,
    /// Technical spec tokens in order of appearance
    pub technical_specs: Vec<String>,
    /// Unique tags, iterated in lexical order
    pub tags: BTreeSet<String>,
    pub is_nsfw: bool,
    pub has_sfw_version: bool,
    pub has_nsfw_version: bool,
    /// The category came from a special pattern rather than priority
    pub priority_override: bool,
}

/// Classifies file names against a shared rule set.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Arc<RuleSet>,
    default_category: String,
}

impl Classifier {
    #[must_use]
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }

    /// Use `category` instead of `MISC` when nothing matches.
    #[must_use]
    pub fn with_default_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        if !category.trim().is_empty() {
            self.default_category = category;
        }
        self
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    #[must_use]
    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    /// Raw rule report for `filename`, without any decisions applied.
    #[must_use]
    pub fn matches(&self, filename: &str) -> RuleMatches {
        let name = file_name_of(filename);
        match_rules(&name, &self.rules)
    }

    /// Classify a file name using the name alone.
    #[must_use]
    pub fn classify(&self, filename: &str) -> ClassificationResult {
        self.classify_with_contents(filename, None)
    }

    /// Classify a file name, adding content tags when archive contents are
    /// available.
    #[must_use]
    pub fn classify_with_contents(
        &self,
        filename: &str,
        contents: Option<&ArchiveContents>,
    ) -> ClassificationResult {
        let name = file_name_of(filename);
        let matches = match_rules(&name, &self.rules);

        let override_match = matches.category_override();
        let (category, label_triggers) = match (override_match, matches.top_category()) {
            (Some(special), _) => (
                special.pattern_type.clone(),
                self.rules
                    .special_pattern(&special.pattern_type)
                    .map(|s| &s.triggers),
            ),
            (None, Some(top)) => (
                top.category.clone(),
                self.rules.category(&top.category).map(|c| &c.triggers),
            ),
            (None, None) => (self.default_category.clone(), None),
        };

        let mut tags = BTreeSet::new();

        let franchise = matches.franchises.first().map(|f| {
            for related in &f.related_categories {
                if *related != category {
                    tags.insert(related.clone());
                }
            }
            f.name.clone()
        });

        let mut creator = None;
        for matched in matches.creators.iter().filter(|c| c.always_tag) {
            tags.insert(matched.name.clone());
            creator.get_or_insert_with(|| matched.name.clone());
        }

        tags.extend(matches.tags.iter().cloned());

        if let Some(contents) = contents {
            self.add_content_tags(contents, &mut tags);
        }

        let base_name = self.clean_base_name(&name, &matches, label_triggers);

        ClassificationResult {
            original_name: name.into_owned(),
            base_name,
            category,
            franchise,
            creator,
            version: matches.version.clone(),
            technical_specs: matches.technical.clone(),
            tags,
            is_nsfw: matches.nsfw_status.is_nsfw,
            has_sfw_version: matches.nsfw_status.has_both_versions,
            has_nsfw_version: matches.nsfw_status.has_both_versions,
            priority_override: override_match.is_some(),
        }
    }

    fn add_content_tags(&self, contents: &ArchiveContents, tags: &mut BTreeSet<String>) {
        let entries: Vec<String> = contents
            .entry_names
            .iter()
            .map(|e| e.to_lowercase())
            .collect();

        for rule in self.rules.content_tags() {
            if entries.iter().any(|e| rule.triggers.matches(e)) {
                tags.insert(rule.tag.clone());
            }
        }
        tags.extend(contents.flag_tags().into_iter().map(str::to_string));
    }

    /// Strip version, technical specs, creator triggers and the whole-token
    /// triggers of the category that supplied the label, then normalise
    /// separators.
    ///
    /// Falls back to keeping the category words when stripping them would
    /// leave nothing.
    fn clean_base_name(
        &self,
        name: &str,
        matches: &RuleMatches,
        label_triggers: Option<&TriggerSet>,
    ) -> String {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name);

        let mut spans = Vec::new();
        if matches.version.is_some() {
            spans.extend(self.version_span(stem));
        }
        spans.extend(self.technical_spans(stem));
        let mut text = blank_spans(stem, spans);

        for matched in &matches.creators {
            if let Some(rule) = self.rules.creators().iter().find(|c| c.name == matched.name) {
                text = rule.triggers.strip(&text).into_owned();
            }
        }

        if let Some(triggers) = label_triggers {
            let without_label = normalize_separators(&triggers.strip_tokens(&text));
            if !without_label.is_empty() {
                return without_label;
            }
        }

        let cleaned = normalize_separators(&text);
        if cleaned.is_empty() {
            normalize_separators(stem)
        } else {
            cleaned
        }
    }

    /// Byte range of the version token (including its `v`) in `stem`.
    fn version_span(&self, stem: &str) -> Option<Range<usize>> {
        let group = self.rules.naming().version.captures(stem)?.get(1)?;
        let mut start = group.start();
        if start > 0 && matches!(stem.as_bytes()[start - 1], b'v' | b'V') {
            start -= 1;
        }
        Some(start..group.end())
    }

    fn technical_spans(&self, stem: &str) -> Vec<Range<usize>> {
        let re = &self.rules.naming().technical_specs;
        if re.captures_len() > 1 {
            re.captures_iter(stem)
                .filter_map(|caps| caps.get(1).map(|m| m.range()))
                .collect()
        } else {
            re.find_iter(stem).map(|m| m.range()).collect()
        }
    }
}

/// File-name component of `filename`, NFC-normalised.
fn file_name_of(filename: &str) -> std::borrow::Cow<'_, str> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    normalize_path_str_cow(name)
}

/// Replace every byte range in `spans` with a single space.
fn blank_spans(text: &str, mut spans: Vec<Range<usize>>) -> String {
    spans.sort_by_key(|r| r.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if span.end <= cursor {
            continue;
        }
        if span.start >= cursor {
            out.push_str(&text[cursor..span.start]);
            out.push(' ');
        }
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Underscores and hyphens become spaces; whitespace runs collapse.
fn normalize_separators(text: &str) -> String {
    text.replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(Arc::new(RuleSet::builtin().unwrap()))
    }

    #[test]
    fn test_end_to_end_figure_pack() {
        let result = classifier().classify("HEX3D_Figure_Pack_v2.zip");
        assert_eq!(result.original_name, "HEX3D_Figure_Pack_v2.zip");
        assert_eq!(result.category, "FIGURE");
        assert_eq!(result.creator.as_deref(), Some("HEX3D"));
        assert_eq!(result.version.as_deref(), Some("2"));
        assert_eq!(result.base_name, "Pack");
        assert!(result.tags.contains("HEX3D"));
        assert!(!result.priority_override);
    }

    #[test]
    fn test_default_category() {
        let result = classifier().classify("qqq.zip");
        assert_eq!(result.category, "MISC");
        assert_eq!(result.base_name, "qqq");

        let result = classifier()
            .with_default_category("UNSORTED")
            .classify("qqq.zip");
        assert_eq!(result.category, "UNSORTED");
    }

    #[test]
    fn test_blank_default_category_is_ignored() {
        let c = classifier().with_default_category("  ");
        assert_eq!(c.default_category(), "MISC");
    }

    #[test]
    fn test_override_wins_over_priority() {
        let result = classifier().classify("Dragon_Bust_Bundle.zip");
        assert_eq!(result.category, "BUNDLE");
        assert!(result.priority_override);
        assert_eq!(result.base_name, "Dragon Bust");
    }

    #[test]
    fn test_franchise_related_categories_become_tags() {
        let result = classifier().classify("Pikachu_statue.zip");
        assert_eq!(result.franchise.as_deref(), Some("Pokemon"));
        assert_eq!(result.category, "FIGURE");
        // FIGURE is the chosen category so it is not repeated as a tag
        assert!(!result.tags.contains("FIGURE"));

        let result = classifier().classify("Space_Marine_40k_mini.zip");
        assert_eq!(result.franchise.as_deref(), Some("Warhammer"));
        assert_eq!(result.category, "MINI");
        assert!(!result.tags.contains("MINI"));

        let result = classifier().classify("Mandalorian_bust.zip");
        assert_eq!(result.category, "BUST");
        assert!(result.tags.contains("PROP"));
    }

    #[test]
    fn test_creator_not_always_tag_is_stripped_but_not_recorded() {
        let result = classifier().classify("uploaded_by_Orc.zip");
        assert!(result.creator.is_none());
        assert_eq!(result.base_name, "Orc");
    }

    #[test]
    fn test_technical_specs_removed_from_base() {
        let result = classifier().classify("Knight_32mm_v1.2_presupported.zip");
        assert_eq!(result.category, "MINI");
        assert_eq!(result.technical_specs, vec!["32mm"]);
        assert_eq!(result.version.as_deref(), Some("1.2"));
        assert!(result.tags.contains("PRESUPPORTED"));
        assert_eq!(result.base_name, "Knight presupported");
    }

    #[test]
    fn test_nsfw_flags() {
        let result = classifier().classify("Elf_SFW_and_NSFW.zip");
        assert!(result.is_nsfw);
        assert!(result.has_sfw_version);
        assert!(result.has_nsfw_version);

        let result = classifier().classify("Elf_NSFW.zip");
        assert!(result.is_nsfw);
        assert!(!result.has_sfw_version);
    }

    #[test]
    fn test_content_tags() {
        let contents = ArchiveContents::from_entries(["Dragon/body.STL", "print.LYS", "readme.txt"]);
        let result = classifier().classify_with_contents("Dragon.zip", Some(&contents));
        let tags: Vec<_> = result.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["DOCUMENTED", "LYCHEE", "STL"]);
    }

    #[test]
    fn test_base_name_falls_back_when_only_category_words() {
        let result = classifier().classify("terrain_tiles.zip");
        assert_eq!(result.category, "TERRAIN");
        assert_eq!(result.base_name, "terrain tiles");
    }

    #[test]
    fn test_label_trigger_inside_a_word_is_kept() {
        let result = classifier().classify("Robust_Knight_Bust.zip");
        assert_eq!(result.category, "BUST");
        assert_eq!(result.base_name, "Robust Knight");

        let result = classifier().classify("Figurehead-Ship_Figure.zip");
        assert_eq!(result.category, "FIGURE");
        assert_eq!(result.base_name, "Figurehead Ship");
    }

    #[test]
    fn test_path_components_are_ignored() {
        let result = classifier().classify("/downloads/figure/qqq.zip");
        assert_eq!(result.category, "MISC");
        assert_eq!(result.original_name, "qqq.zip");
    }

    #[test]
    fn test_nfd_name_normalised() {
        let result = classifier().classify("Cafe\u{0301}_statue.zip");
        assert_eq!(result.base_name, "Caf\u{e9}");
    }

    #[test]
    fn test_blank_spans_merges_overlaps() {
        assert_eq!(blank_spans("abcdef", vec![3..5, 1..4]), "a f");
        assert_eq!(blank_spans("abc", vec![]), "abc");
    }

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_separators("  a__b--c  d "), "a b c d");
    }
}
