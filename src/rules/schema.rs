//! Serde model of the rule-set document.
//!
//! The document has six required top-level sections: `categories`,
//! `franchises`, `creators`, `special_patterns`, `tag_rules` and
//! `naming_patterns`. Every mapping is an [`IndexMap`] because declaration
//! order is significant: the first matching franchise and the first matching
//! category override are chosen in the order the document lists them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Names of the sections every rule-set document must contain.
pub const REQUIRED_SECTIONS: [&str; 6] = [
    "categories",
    "franchises",
    "creators",
    "special_patterns",
    "tag_rules",
    "naming_patterns",
];

/// Typed view of a validated rule-set document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDocument {
    /// Category name → category rule
    pub categories: IndexMap<String, CategoryRule>,
    /// Franchise name → franchise rule
    pub franchises: IndexMap<String, FranchiseRule>,
    /// Creator name → creator rule
    pub creators: IndexMap<String, CreatorRule>,
    /// Special pattern type → override rule
    pub special_patterns: IndexMap<String, SpecialPatternRule>,
    /// Automatic and content-based tag rules
    pub tag_rules: TagRules,
    /// Regular expressions for version, technical specs and NSFW indicators
    pub naming_patterns: NamingPatterns,
}

/// A top-level classification label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Substring triggers (matched case-insensitively)
    pub patterns: Vec<String>,
    /// Higher wins when several categories match
    pub priority: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FranchiseRule {
    pub patterns: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Categories added as tags when this franchise matches
    #[serde(default)]
    pub related_categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorRule {
    pub patterns: Vec<String>,
    /// Add the creator's name to the tag set whenever it matches
    #[serde(default)]
    pub always_tag: bool,
    #[serde(default)]
    pub trusted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialPatternRule {
    pub patterns: Vec<String>,
    /// When set, the pattern type replaces the priority-selected category
    #[serde(default)]
    pub override_category: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRules {
    /// Tag name → filename triggers
    #[serde(default)]
    pub auto_tags: IndexMap<String, Vec<String>>,
    /// Tag name → archive entry substrings
    #[serde(default)]
    pub content_based_tags: IndexMap<String, ContentTagRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTagRule {
    #[serde(default)]
    pub file_contains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingPatterns {
    /// Its first capture group is the version string
    pub version: PatternDefinition,
    pub technical_specs: PatternDefinition,
    pub nsfw_indicators: PatternDefinition,
}

/// A regular expression with an optional human description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDefinition {
    pub regex: String,
    #[serde(default)]
    pub description: String,
}
