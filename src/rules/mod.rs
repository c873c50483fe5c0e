//! Rule sets: the data-defined vocabulary the classifier matches against.
//!
//! A [`RuleSet`] is loaded once, validated as a whole and then shared
//! read-only (usually behind an `Arc`) by every classifier and composer that
//! needs it. There is no process-wide rule state; callers that want
//! different rules load a new instance.
//!
//! # Example
//!
//! ```
//! use model_archivist::rules::RuleSet;
//!
//! let rules = RuleSet::builtin().unwrap();
//! assert!(rules.categories().iter().any(|c| c.name == "FIGURE"));
//! ```

pub mod loader;
pub mod schema;

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

pub use schema::{
    CategoryRule, ContentTagRule, CreatorRule, FranchiseRule, NamingPatterns, PatternDefinition,
    RuleDocument, SpecialPatternRule, TagRules, REQUIRED_SECTIONS,
};

const BUILTIN_RULES: &str = include_str!("../../rules/default_rules.json");

/// Errors raised while loading, importing or exporting a rule set.
#[derive(Debug, Error)]
pub enum RuleSetError {
    /// The document is malformed or breaks a structural invariant.
    #[error("invalid rule set '{origin}': {}", .problems.join("; "))]
    Invalid {
        /// Where the document came from (a path or a label)
        origin: String,
        /// Every problem found, in document order
        problems: Vec<String>,
    },

    #[error("I/O error on rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RuleSetError {
    pub(crate) fn invalid(origin: &str, problems: Vec<String>) -> Self {
        Self::Invalid {
            origin: origin.to_string(),
            problems,
        }
    }

    /// Problems reported by validation, empty for I/O failures.
    #[must_use]
    pub fn problems(&self) -> &[String] {
        match self {
            Self::Invalid { problems, .. } => problems,
            Self::Io { .. } => &[],
        }
    }
}

/// A set of lowercase substring triggers plus a case-insensitive regex that
/// removes them from a name.
#[derive(Debug, Clone)]
pub struct TriggerSet {
    triggers: Vec<String>,
    strip: Regex,
    /// Triggers standing alone between separators
    strip_tokens: Option<Regex>,
}

impl TriggerSet {
    fn compile(raw: &[String]) -> Result<Self, regex::Error> {
        let mut triggers: Vec<String> = raw.iter().map(|t| t.to_lowercase()).collect();
        triggers.dedup();

        let mut alternation: Vec<&String> = triggers.iter().collect();
        alternation.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let pattern = alternation
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let strip = Regex::new(&format!("(?i)(?:{})", pattern))?;

        let words: Vec<String> = alternation
            .iter()
            .map(|t| t.trim_matches(TOKEN_SEPARATORS))
            .filter(|t| !t.is_empty())
            .map(regex::escape)
            .collect();
        let strip_tokens = if words.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(
                r"(?i)(?:^|[_\-\s])(?:{})(?:[_\-\s]|$)",
                words.join("|")
            ))?)
        };

        Ok(Self {
            triggers,
            strip,
            strip_tokens,
        })
    }

    /// True if any trigger is a substring of `lowered`.
    ///
    /// `lowered` must already be lowercase.
    #[must_use]
    pub fn matches(&self, lowered: &str) -> bool {
        self.triggers.iter().any(|t| lowered.contains(t.as_str()))
    }

    /// Replace every occurrence of any trigger (any case) with a space.
    #[must_use]
    pub fn strip<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.strip.replace_all(text, " ")
    }

    /// Replace triggers that form whole tokens, delimited by `_`, `-`,
    /// whitespace or the ends of `text`, with a space.
    ///
    /// `Robust_Bust` loses only its second token.
    #[must_use]
    pub fn strip_tokens(&self, text: &str) -> String {
        let Some(re) = &self.strip_tokens else {
            return text.to_string();
        };
        // Adjacent matches share a separator, so repeat until nothing changes.
        let mut current = text.to_string();
        loop {
            let next = re.replace_all(&current, " ").into_owned();
            if next == current {
                return current;
            }
            current = next;
        }
    }

    #[must_use]
    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }
}

const TOKEN_SEPARATORS: &[char] = &['_', '-', ' '];

#[derive(Debug, Clone)]
pub struct CompiledCategory {
    pub name: String,
    pub priority: u32,
    pub description: String,
    pub triggers: TriggerSet,
}

#[derive(Debug, Clone)]
pub struct CompiledFranchise {
    pub name: String,
    pub aliases: Vec<String>,
    pub related_categories: Vec<String>,
    pub triggers: TriggerSet,
}

#[derive(Debug, Clone)]
pub struct CompiledCreator {
    pub name: String,
    pub always_tag: bool,
    pub trusted: bool,
    pub triggers: TriggerSet,
}

#[derive(Debug, Clone)]
pub struct CompiledSpecialPattern {
    pub pattern_type: String,
    pub override_category: bool,
    pub triggers: TriggerSet,
}

#[derive(Debug, Clone)]
pub struct CompiledTag {
    pub tag: String,
    pub triggers: TriggerSet,
}

/// Compiled forms of the three naming regexes.
#[derive(Debug, Clone)]
pub struct NamingRegexes {
    pub version: Regex,
    pub technical_specs: Regex,
    pub nsfw_indicators: Regex,
}

/// An immutable, validated and compiled rule set.
#[derive(Debug, Clone)]
pub struct RuleSet {
    origin: String,
    source: Value,
    document: RuleDocument,
    categories: Vec<CompiledCategory>,
    franchises: Vec<CompiledFranchise>,
    creators: Vec<CompiledCreator>,
    special_patterns: Vec<CompiledSpecialPattern>,
    auto_tags: Vec<CompiledTag>,
    content_tags: Vec<CompiledTag>,
    naming: NamingRegexes,
}

impl RuleSet {
    /// Parse, validate and compile a rule set from JSON text.
    ///
    /// `origin` only labels error messages.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError::Invalid`] with every problem found.
    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, RuleSetError> {
        let (source, document) = loader::parse_document(text, origin)?;
        Self::compile(source, document, origin)
    }

    /// Validate and compile an already-parsed document.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError::Invalid`] with every problem found.
    pub fn from_value(value: Value, origin: &str) -> Result<Self, RuleSetError> {
        let document = loader::validate_document(&value, origin)?;
        Self::compile(value, document, origin)
    }

    /// Load a rule set from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError::Io`] if the file cannot be read and
    /// [`RuleSetError::Invalid`] if it does not validate.
    pub fn load(path: &Path) -> Result<Self, RuleSetError> {
        let text = fs::read_to_string(path).map_err(|source| RuleSetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = Self::from_json_str(&text, &path.display().to_string())?;
        log::debug!(
            "Loaded rule set from {} ({} categories, {} franchises, {} creators)",
            path.display(),
            rules.categories.len(),
            rules.franchises.len(),
            rules.creators.len()
        );
        Ok(rules)
    }

    /// Import a rule document, re-validating it before it is accepted.
    ///
    /// # Errors
    ///
    /// Same as [`RuleSet::load`].
    pub fn import_from(path: &Path) -> Result<Self, RuleSetError> {
        Self::load(path)
    }

    /// The rule set shipped with the binary.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded document is broken.
    pub fn builtin() -> Result<Self, RuleSetError> {
        Self::from_json_str(BUILTIN_RULES, "<builtin>")
    }

    /// Load from `path` when given, otherwise use the built-in rules.
    ///
    /// # Errors
    ///
    /// Same as [`RuleSet::load`].
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, RuleSetError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    /// Write the source document back out unchanged, as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError::Io`] if the file cannot be written.
    pub fn export_to(&self, path: &Path) -> Result<(), RuleSetError> {
        let io_err = |source| RuleSetError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut text = serde_json::to_string_pretty(&self.source)
            .map_err(|e| io_err(std::io::Error::other(e)))?;
        text.push('\n');
        fs::write(path, text).map_err(io_err)
    }

    fn compile(source: Value, document: RuleDocument, origin: &str) -> Result<Self, RuleSetError> {
        let mut problems = Vec::new();
        let mut compile = |ctx: String, raw: &[String]| match TriggerSet::compile(raw) {
            Ok(set) => Some(set),
            Err(e) => {
                problems.push(format!("{}: {}", ctx, e));
                None
            }
        };

        let categories: Vec<_> = document
            .categories
            .iter()
            .filter_map(|(name, rule)| {
                Some(CompiledCategory {
                    name: name.clone(),
                    priority: rule.priority,
                    description: rule.description.clone(),
                    triggers: compile(format!("category '{}'", name), &rule.patterns)?,
                })
            })
            .collect();

        let franchises: Vec<_> = document
            .franchises
            .iter()
            .filter_map(|(name, rule)| {
                Some(CompiledFranchise {
                    name: name.clone(),
                    aliases: rule.aliases.clone(),
                    related_categories: rule.related_categories.clone(),
                    triggers: compile(format!("franchise '{}'", name), &rule.patterns)?,
                })
            })
            .collect();

        let creators: Vec<_> = document
            .creators
            .iter()
            .filter_map(|(name, rule)| {
                Some(CompiledCreator {
                    name: name.clone(),
                    always_tag: rule.always_tag,
                    trusted: rule.trusted,
                    triggers: compile(format!("creator '{}'", name), &rule.patterns)?,
                })
            })
            .collect();

        let special_patterns: Vec<_> = document
            .special_patterns
            .iter()
            .filter_map(|(name, rule)| {
                Some(CompiledSpecialPattern {
                    pattern_type: name.clone(),
                    override_category: rule.override_category,
                    triggers: compile(format!("special pattern '{}'", name), &rule.patterns)?,
                })
            })
            .collect();

        let auto_tags: Vec<_> = document
            .tag_rules
            .auto_tags
            .iter()
            .filter_map(|(tag, triggers)| {
                Some(CompiledTag {
                    tag: tag.clone(),
                    triggers: compile(format!("auto tag '{}'", tag), triggers)?,
                })
            })
            .collect();

        let content_tags: Vec<_> = document
            .tag_rules
            .content_based_tags
            .iter()
            .filter_map(|(tag, rule)| {
                Some(CompiledTag {
                    tag: tag.clone(),
                    triggers: compile(format!("content tag '{}'", tag), &rule.file_contains)?,
                })
            })
            .collect();

        let mut regex = |ctx: &str, def: &PatternDefinition| match Regex::new(&def.regex) {
            Ok(re) => Some(re),
            Err(e) => {
                problems.push(format!("naming pattern '{}': invalid regex: {}", ctx, e));
                None
            }
        };
        let version = regex("version", &document.naming_patterns.version);
        let technical_specs = regex("technical_specs", &document.naming_patterns.technical_specs);
        let nsfw_indicators = regex("nsfw_indicators", &document.naming_patterns.nsfw_indicators);

        match (version, technical_specs, nsfw_indicators) {
            (Some(version), Some(technical_specs), Some(nsfw_indicators)) if problems.is_empty() => {
                Ok(Self {
                    origin: origin.to_string(),
                    source,
                    document,
                    categories,
                    franchises,
                    creators,
                    special_patterns,
                    auto_tags,
                    content_tags,
                    naming: NamingRegexes {
                        version,
                        technical_specs,
                        nsfw_indicators,
                    },
                })
            }
            _ => Err(RuleSetError::invalid(origin, problems)),
        }
    }

    /// Label of the document this rule set was loaded from.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The document exactly as it was read, for pass-through export.
    #[must_use]
    pub fn source_document(&self) -> &Value {
        &self.source
    }

    #[must_use]
    pub fn document(&self) -> &RuleDocument {
        &self.document
    }

    /// Categories in declaration order.
    #[must_use]
    pub fn categories(&self) -> &[CompiledCategory] {
        &self.categories
    }

    #[must_use]
    pub fn franchises(&self) -> &[CompiledFranchise] {
        &self.franchises
    }

    #[must_use]
    pub fn creators(&self) -> &[CompiledCreator] {
        &self.creators
    }

    #[must_use]
    pub fn special_patterns(&self) -> &[CompiledSpecialPattern] {
        &self.special_patterns
    }

    #[must_use]
    pub fn auto_tags(&self) -> &[CompiledTag] {
        &self.auto_tags
    }

    #[must_use]
    pub fn content_tags(&self) -> &[CompiledTag] {
        &self.content_tags
    }

    #[must_use]
    pub fn naming(&self) -> &NamingRegexes {
        &self.naming
    }

    /// Look up a category by name.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&CompiledCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Look up a special pattern by type.
    #[must_use]
    pub fn special_pattern(&self, pattern_type: &str) -> Option<&CompiledSpecialPattern> {
        self.special_patterns
            .iter()
            .find(|s| s.pattern_type == pattern_type)
    }
}
