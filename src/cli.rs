//! Command-line interface definitions.
//!
//! Global options (verbosity, config and rule files, error format) come
//! before the subcommand.
//!
//! # Example
//!
//! ```bash
//! # Classify a directory and print suggested names
//! archivist classify ~/Models
//!
//! # Rename files in place, parentheses around tags
//! archivist rename ~/Models --apply --tag-style parentheses
//!
//! # Find duplicates and mark the newer copy of each pair
//! archivist dupes ~/Models --action mark-newer
//!
//! # Try a file name against the rules
//! archivist rules test "HEX3D_Figure_Pack_v2.zip"
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::actions::ResolutionAction;
use crate::naming::{NamingStyle, TagStyle};
use crate::scanner::DigestAlgorithm;

/// Rule-driven naming, tagging and duplicate detection for 3D-model archives.
#[derive(Debug, Parser)]
#[command(name = "archivist")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file (TOML); defaults to the platform config directory
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Rule file (JSON); overrides `rules_path` from the configuration
    #[arg(long, value_name = "FILE", global = true)]
    pub rules: Option<PathBuf>,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify files and show their suggested names
    Classify(ClassifyArgs),
    /// Rename files to their suggested names
    Rename(RenameArgs),
    /// Find byte-identical files and optionally resolve them
    Dupes(DupesArgs),
    /// Validate, import, export or try out rule files
    Rules(RulesArgs),
}

/// Flags that adjust name composition for one run.
#[derive(Debug, Clone, Default, Args)]
pub struct NamingArgs {
    /// How tags are wrapped in suggested names
    #[arg(long, value_enum, value_name = "STYLE")]
    pub tag_style: Option<TagStyle>,

    /// Leave the category out of suggested names
    #[arg(long)]
    pub no_category_prefix: bool,

    /// Leave version numbers out of suggested names
    #[arg(long)]
    pub no_version: bool,
}

impl NamingArgs {
    /// Apply these flags on top of the configured style.
    #[must_use]
    pub fn apply(&self, mut style: NamingStyle) -> NamingStyle {
        if let Some(tag_style) = self.tag_style {
            style = style.with_tag_style(tag_style);
        }
        if self.no_category_prefix {
            style = style.with_category_prefix(false);
        }
        if self.no_version {
            style = style.with_version_numbers(false);
        }
        style
    }
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Files or directories to classify
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(flatten)]
    pub naming: NamingArgs,

    /// Record results in this SQLite catalog
    #[arg(long, value_name = "DB")]
    pub catalog: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Files or directories to rename
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Perform the renames; without this flag only the plan is printed
    #[arg(long)]
    pub apply: bool,

    /// Replace files that already have the suggested name
    #[arg(long, requires = "apply")]
    pub overwrite: bool,

    #[command(flatten)]
    pub naming: NamingArgs,

    /// Record results in this SQLite catalog
    #[arg(long, value_name = "DB")]
    pub catalog: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DupesArgs {
    /// Files or directories to search
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// What to do with each duplicate pair
    #[arg(short, long, value_enum, default_value = "keep-both")]
    pub action: ResolutionAction,

    /// Delete permanently instead of moving to the trash
    ///
    /// Warning: Files cannot be recovered after permanent deletion.
    #[arg(long)]
    pub permanent: bool,

    /// Confirm delete actions (required with delete-newer / delete-older)
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Number of I/O threads for hashing
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub io_threads: Option<u16>,

    /// Digest used to confirm duplicates
    #[arg(long, value_enum)]
    pub digest: Option<DigestArg>,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: ReportFormat,
}

#[derive(Debug, Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// Check a rule file and list every problem found
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Write the active rule set to a file
    Export {
        #[arg(value_name = "DEST")]
        dest: PathBuf,
    },
    /// Validate a rule file and install it as the configured rule file
    Import {
        #[arg(value_name = "SRC")]
        src: PathBuf,
    },
    /// Show how a file name is matched, classified and renamed
    Test {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

/// Output format for classification results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    Text,
    /// JSON for scripting
    Json,
    /// CSV for spreadsheets
    Csv,
}

/// Output format for duplicate reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

/// `--digest` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DigestArg {
    Sha256,
    Blake3,
}

impl From<DigestArg> for DigestAlgorithm {
    fn from(arg: DigestArg) -> Self {
        match arg {
            DigestArg::Sha256 => Self::Sha256,
            DigestArg::Blake3 => Self::Blake3,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}
