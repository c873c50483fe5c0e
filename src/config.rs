//! Application configuration management.
//!
//! Settings are layered with figment, later layers overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file (the platform config directory, or `--config FILE`)
//! 3. `ARCHIVIST_*` environment variables, `__` separating nested keys
//!    (for example `ARCHIVIST_NAMING__TAG_STYLE=parentheses`)
//! 4. Command-line flags, applied by the caller
//!
//! # Example file
//!
//! ```toml
//! rules_path = "/home/me/rules.json"
//! io_threads = 8
//!
//! [naming]
//! tag_style = "parentheses"
//! add_category_prefix = false
//!
//! [duplicates]
//! marker = "_COPY"
//! digest = "blake3"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::DEFAULT_CATEGORY;
use crate::naming::{NamingStyle, TagStyle};
use crate::scanner::{DigestAlgorithm, WalkerConfig};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "ARCHIVIST_";

/// Errors from loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Figment(#[from] figment::Error),

    #[error("cannot access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule file; the embedded rules are used when unset
    pub rules_path: Option<PathBuf>,
    /// SQLite catalog; nothing is recorded when unset
    pub catalog_path: Option<PathBuf>,
    /// Worker threads for fingerprinting and resolution
    pub io_threads: usize,
    /// Extensions kept when walking directories
    pub archive_extensions: Vec<String>,
    /// Gitignore-style patterns skipped when walking directories
    pub ignore_patterns: Vec<String>,
    pub follow_symlinks: bool,
    /// Skip files and directories whose names start with `.`
    pub skip_hidden: bool,
    pub naming: NamingConfig,
    pub duplicates: DuplicatesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_path: None,
            catalog_path: None,
            io_threads: 4,
            archive_extensions: vec!["zip".into(), "rar".into(), "7z".into()],
            ignore_patterns: vec!["thumbs.db".into(), ".ds_store".into()],
            follow_symlinks: false,
            skip_hidden: false,
            naming: NamingConfig::default(),
            duplicates: DuplicatesConfig::default(),
        }
    }
}

/// `[naming]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub add_category_prefix: bool,
    pub preserve_version_numbers: bool,
    pub tag_style: TagStyle,
    /// Category used when no rule matches
    pub default_category: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            add_category_prefix: true,
            preserve_version_numbers: true,
            tag_style: TagStyle::default(),
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

/// `[duplicates]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatesConfig {
    /// Appended to the stem of files marked as duplicates
    pub marker: String,
    /// Delete permanently instead of using the trash
    pub permanent_delete: bool,
    /// Re-check size and mtime before touching a file
    pub verify_unchanged: bool,
    pub digest: DigestAlgorithm,
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self {
            marker: crate::actions::resolve::DEFAULT_MARKER.to_string(),
            permanent_delete: false,
            verify_unchanged: true,
            digest: DigestAlgorithm::default(),
        }
    }
}

/// A key in a config file that no setting uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey {
    /// Dotted path, e.g. `naming.tag_stlye`
    pub key: String,
    /// Closest known key at the same level
    pub suggestion: Option<String>,
}

impl std::fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.suggestion {
            Some(s) => write!(f, "unknown config key '{}' (did you mean '{}'?)", self.key, s),
            None => write!(f, "unknown config key '{}'", self.key),
        }
    }
}

impl Config {
    /// Load from the default platform-specific path.
    #[must_use]
    pub fn load() -> Self {
        Self::load_from_path(None)
    }

    /// Load from `path` (or the default path), falling back to defaults on
    /// any error.
    #[must_use]
    pub fn load_from_path(path: Option<&Path>) -> Self {
        match Self::try_load_from_path(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load from `path` (or the default path), reporting errors.
    ///
    /// A missing file is not an error. Unknown keys are logged as warnings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is malformed or a value has the
    /// wrong type.
    pub fn try_load_from_path(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path.as_deref().filter(|p| p.exists()) {
            let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            for unknown in unknown_keys(&text) {
                log::warn!("{}: {}", path.display(), unknown);
            }
            log::debug!("Loading config from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Ok(figment.extract()?)
    }

    /// Write the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default platform-specific configuration file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Default location for the rule file copied by `rules import`.
    #[must_use]
    pub fn default_rules_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("rules.json"))
    }

    /// Name-composition settings.
    #[must_use]
    pub fn naming_style(&self) -> NamingStyle {
        NamingStyle::default()
            .with_category_prefix(self.naming.add_category_prefix)
            .with_version_numbers(self.naming.preserve_version_numbers)
            .with_tag_style(self.naming.tag_style)
    }

    /// Candidate-discovery settings.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::default()
            .with_extensions(self.archive_extensions.clone())
            .with_ignore_patterns(self.ignore_patterns.clone())
            .with_follow_symlinks(self.follow_symlinks)
            .with_skip_hidden(self.skip_hidden)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "model-archivist", "model-archivist")
}

/// Keys in `text` that [`Config`] does not know, with suggestions.
///
/// Returns nothing when `text` is not valid TOML; figment reports that.
#[must_use]
pub fn unknown_keys(text: &str) -> Vec<UnknownKey> {
    let Ok(table) = text.parse::<toml::Table>() else {
        return Vec::new();
    };
    let Ok(known) = serde_json::to_value(Config::default()) else {
        return Vec::new();
    };
    let mut unknown = Vec::new();
    collect_unknown(&table, &known, "", &mut unknown);
    unknown
}

fn collect_unknown(
    table: &toml::Table,
    known: &serde_json::Value,
    prefix: &str,
    out: &mut Vec<UnknownKey>,
) {
    let Some(known) = known.as_object() else {
        return;
    };
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match known.get(key) {
            Some(expected) => {
                if let toml::Value::Table(nested) = value {
                    collect_unknown(nested, expected, &path, out);
                }
            }
            None => {
                let suggestion = known
                    .keys()
                    .map(|k| (strsim::jaro_winkler(key, k), k))
                    .filter(|(score, _)| *score >= 0.8)
                    .max_by(|a, b| a.0.total_cmp(&b.0))
                    .map(|(_, k)| k.clone());
                out.push(UnknownKey {
                    key: path,
                    suggestion,
                });
            }
        }
    }
}
