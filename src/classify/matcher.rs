//! Raw per-rule match report for a single name.

use serde::{Deserialize, Serialize};

use crate::rules::RuleSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMatch {
    pub category: String,
    pub priority: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FranchiseMatch {
    pub name: String,
    pub aliases: Vec<String>,
    pub related_categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorMatch {
    pub name: String,
    pub always_tag: bool,
    pub trusted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialPatternMatch {
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub override_category: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsfwStatus {
    pub is_nsfw: bool,
    /// The name encodes paired safe and unsafe variants
    pub has_both_versions: bool,
}

/// Everything the rule set recognises in a name, before any decision is made.
///
/// Categories are sorted by priority (highest first) with ties broken by
/// name; every other list keeps the rule set's declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatches {
    pub categories: Vec<CategoryMatch>,
    pub franchises: Vec<FranchiseMatch>,
    pub creators: Vec<CreatorMatch>,
    pub special_patterns: Vec<SpecialPatternMatch>,
    /// Auto tags whose triggers appear in the name
    pub tags: Vec<String>,
    /// Technical spec tokens in order of appearance
    pub technical: Vec<String>,
    pub version: Option<String>,
    pub nsfw_status: NsfwStatus,
}

impl RuleMatches {
    /// The highest-ranked category, if any matched.
    #[must_use]
    pub fn top_category(&self) -> Option<&CategoryMatch> {
        self.categories.first()
    }

    /// The first special pattern that overrides the category.
    #[must_use]
    pub fn category_override(&self) -> Option<&SpecialPatternMatch> {
        self.special_patterns.iter().find(|s| s.override_category)
    }
}

/// Match `name` against every rule in `rules`.
#[must_use]
pub fn match_rules(name: &str, rules: &RuleSet) -> RuleMatches {
    let lowered = name.to_lowercase();

    let mut categories: Vec<CategoryMatch> = rules
        .categories()
        .iter()
        .filter(|c| c.triggers.matches(&lowered))
        .map(|c| CategoryMatch {
            category: c.name.clone(),
            priority: c.priority,
            description: c.description.clone(),
        })
        .collect();
    categories.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.category.cmp(&b.category))
    });

    let franchises = rules
        .franchises()
        .iter()
        .filter(|f| f.triggers.matches(&lowered))
        .map(|f| FranchiseMatch {
            name: f.name.clone(),
            aliases: f.aliases.clone(),
            related_categories: f.related_categories.clone(),
        })
        .collect();

    let creators = rules
        .creators()
        .iter()
        .filter(|c| c.triggers.matches(&lowered))
        .map(|c| CreatorMatch {
            name: c.name.clone(),
            always_tag: c.always_tag,
            trusted: c.trusted,
        })
        .collect();

    let special_patterns = rules
        .special_patterns()
        .iter()
        .filter(|s| s.triggers.matches(&lowered))
        .map(|s| SpecialPatternMatch {
            pattern_type: s.pattern_type.clone(),
            override_category: s.override_category,
        })
        .collect();

    let tags = rules
        .auto_tags()
        .iter()
        .filter(|t| t.triggers.matches(&lowered))
        .map(|t| t.tag.clone())
        .collect();

    let naming = rules.naming();

    let technical = if naming.technical_specs.captures_len() > 1 {
        naming
            .technical_specs
            .captures_iter(name)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect()
    } else {
        naming
            .technical_specs
            .find_iter(name)
            .map(|m| m.as_str().to_string())
            .collect()
    };

    let version = naming
        .version
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let nsfw_status = if naming.nsfw_indicators.is_match(&lowered) {
        NsfwStatus {
            is_nsfw: true,
            has_both_versions: true,
        }
    } else {
        NsfwStatus {
            is_nsfw: lowered.contains("nsfw"),
            has_both_versions: false,
        }
    };

    RuleMatches {
        categories,
        franchises,
        creators,
        special_patterns,
        tags,
        technical,
        version,
        nsfw_status,
    }
}
