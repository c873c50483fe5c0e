//! Suggested-name composition.
//!
//! The composed name is built in a fixed order:
//! `[CATEGORY] [Franchise] base [vVERSION] [specs...] [tags...]`, with tags
//! always rendered in lexical order so the same result and style produce
//! byte-identical output.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classify::ClassificationResult;

/// How tags are wrapped when appended to a name.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TagStyle {
    /// `[TAG]`
    #[default]
    Brackets,
    /// `(TAG)`
    Parentheses,
    /// Bare `TAG`
    None,
}

/// Output-style configuration for [`NameComposer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingStyle {
    pub add_category_prefix: bool,
    pub preserve_version_numbers: bool,
    pub tag_style: TagStyle,
}

impl Default for NamingStyle {
    fn default() -> Self {
        Self {
            add_category_prefix: true,
            preserve_version_numbers: true,
            tag_style: TagStyle::Brackets,
        }
    }
}

impl NamingStyle {
    #[must_use]
    pub fn with_category_prefix(mut self, enabled: bool) -> Self {
        self.add_category_prefix = enabled;
        self
    }

    #[must_use]
    pub fn with_version_numbers(mut self, enabled: bool) -> Self {
        self.preserve_version_numbers = enabled;
        self
    }

    #[must_use]
    pub fn with_tag_style(mut self, style: TagStyle) -> Self {
        self.tag_style = style;
        self
    }
}

/// Builds suggested names from classification results.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameComposer {
    style: NamingStyle,
}

impl NameComposer {
    #[must_use]
    pub fn new(style: NamingStyle) -> Self {
        Self { style }
    }

    #[must_use]
    pub fn style(&self) -> NamingStyle {
        self.style
    }

    /// Compose the suggested name (without extension).
    #[must_use]
    pub fn compose(&self, result: &ClassificationResult) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.style.add_category_prefix {
            parts.push(result.category.clone());
        }
        if let Some(franchise) = &result.franchise {
            parts.push(franchise.clone());
        }
        parts.push(result.base_name.clone());
        if self.style.preserve_version_numbers {
            if let Some(version) = &result.version {
                parts.push(format!("v{}", version));
            }
        }
        parts.extend(result.technical_specs.iter().cloned());

        // BTreeSet iteration is already lexical
        parts.extend(
            result
                .tags
                .iter()
                .map(|tag| format_tag(tag, self.style.tag_style)),
        );

        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }

    /// Compose a file name: the suggested name, sanitised, plus the
    /// extension of `original_path`.
    #[must_use]
    pub fn compose_file_name(&self, result: &ClassificationResult, original_path: &Path) -> String {
        let stem = sanitize_file_name(&self.compose(result));
        match original_path.extension().and_then(|e| e.to_str()) {
            Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext),
            _ => stem,
        }
    }
}

/// Wrap a tag according to `style`.
#[must_use]
pub fn format_tag(tag: &str, style: TagStyle) -> String {
    match style {
        TagStyle::Brackets => format!("[{}]", tag),
        TagStyle::Parentheses => format!("({})", tag),
        TagStyle::None => tag.to_string(),
    }
}

/// Replace characters that are not allowed in file names with `_`.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim_end_matches(['.', ' ']).to_string()
}
