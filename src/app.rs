//! Command dispatch.
//!
//! [`run_app`] is what the binary calls after parsing arguments. It sets up
//! logging, configuration, rules and the Ctrl+C hook, runs one subcommand and
//! returns the exit code. Fatal problems come back as `anyhow` errors so the
//! caller can map them with [`ExitCode::for_error`].

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use yansi::Paint;

use crate::actions::{apply_rename, plan_rename, ResolutionReport, ResolveConfig, Resolver};
use crate::archive::{inspect_or_default, ArchiveInspector, FilenameOnlyInspector};
use crate::catalog::{CatalogSink, FileRecord, FileStatus, SqliteCatalog};
use crate::classify::{ClassificationResult, Classifier};
use crate::cli::{
    ClassifyArgs, Cli, Commands, DupesArgs, OutputFormat, RenameArgs, ReportFormat, RulesCommand,
};
use crate::config::Config;
use crate::duplicates::{pairs_from_groups, DuplicateFinder, FinderConfig, FinderError};
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::naming::NameComposer;
use crate::output::{ClassificationReport, ClassificationRow, CsvOutput, DuplicateReport};
use crate::progress::Progress;
use crate::rules::RuleSet;
use crate::scanner::walker::collect_candidates;
use crate::scanner::{FileEntry, Fingerprinter, ScanError};
use crate::signal::install_handler;

/// Run one command.
///
/// # Errors
///
/// Returns an error for fatal problems: an invalid rule file, a missing or
/// unreadable input, an interrupted scan or a failed write to stdout.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let config = match cli.config.as_deref() {
        Some(path) => Config::try_load_from_path(Some(path))
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load(),
    };
    let rules_path = cli.rules.clone().or_else(|| config.rules_path.clone());
    let ctx = AppContext {
        config,
        rules_path,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Classify(args) => run_classify(&ctx, args),
        Commands::Rename(args) => run_rename(&ctx, args),
        Commands::Dupes(args) => run_dupes(&ctx, args),
        Commands::Rules(args) => run_rules(&ctx, args.command),
    }
}

/// Settings shared by every subcommand.
struct AppContext {
    config: Config,
    rules_path: Option<PathBuf>,
    quiet: bool,
}

impl AppContext {
    fn load_rules(&self) -> Result<Arc<RuleSet>> {
        let rules = RuleSet::load_or_builtin(self.rules_path.as_deref())
            .context("failed to load rule set")?;
        log::debug!("Using rules from {}", rules.origin());
        Ok(Arc::new(rules))
    }

    fn classifier(&self) -> Result<Classifier> {
        Ok(Classifier::new(self.load_rules()?)
            .with_default_category(self.config.naming.default_category.clone()))
    }

    fn catalog(&self, override_path: Option<&Path>) -> Result<Option<SqliteCatalog>> {
        let Some(path) = override_path.or(self.config.catalog_path.as_deref()) else {
            return Ok(None);
        };
        let catalog = SqliteCatalog::open(path)
            .with_context(|| format!("failed to open catalog {}", path.display()))?;
        log::info!("Recording into catalog {}", path.display());
        Ok(Some(catalog))
    }

    fn io_threads(&self, requested: Option<u16>) -> usize {
        requested.map_or(self.config.io_threads, usize::from).max(1)
    }
}

/// Walk `paths` for candidates, failing only when nothing given exists.
fn gather(
    ctx: &AppContext,
    paths: &[PathBuf],
    shutdown: &Arc<AtomicBool>,
) -> Result<(Vec<FileEntry>, Vec<ScanError>)> {
    if let Some(missing) = paths.iter().find(|p| !p.exists()) {
        if paths.iter().all(|p| !p.exists()) {
            return Err(FinderError::PathNotFound(missing.clone()).into());
        }
    }

    let (files, errors) = collect_candidates(
        paths,
        &ctx.config.walker_config(),
        Some(Arc::clone(shutdown)),
    );
    if shutdown.load(Ordering::SeqCst) {
        return Err(FinderError::Interrupted.into());
    }
    for error in &errors {
        log::warn!("{}", error);
    }
    Ok((files, errors))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// One classified candidate.
struct Classified {
    entry: FileEntry,
    result: ClassificationResult,
    suggested_name: String,
    suggested_file_name: String,
}

fn classify_all(
    classifier: &Classifier,
    composer: &NameComposer,
    inspector: &dyn ArchiveInspector,
    files: Vec<FileEntry>,
) -> Vec<Classified> {
    files
        .into_par_iter()
        .map(|entry| {
            let contents = inspect_or_default(inspector, &entry.path);
            let result =
                classifier.classify_with_contents(&file_name(&entry.path), Some(&contents));
            let suggested_name = composer.compose(&result);
            let suggested_file_name = composer.compose_file_name(&result, &entry.path);
            Classified {
                entry,
                result,
                suggested_name,
                suggested_file_name,
            }
        })
        .collect()
}

fn record_into(catalog: &dyn CatalogSink, record: &FileRecord) {
    if let Err(e) = catalog.record(record) {
        log::warn!(
            "Failed to record {} in catalog: {}",
            record.original_path.display(),
            e
        );
    }
}

fn run_classify(ctx: &AppContext, args: ClassifyArgs) -> Result<ExitCode> {
    let classifier = ctx.classifier()?;
    let composer = NameComposer::new(args.naming.apply(ctx.config.naming_style()));
    let catalog = ctx.catalog(args.catalog.as_deref())?;
    let shutdown = install_handler().get_flag();

    let (files, errors) = gather(ctx, &args.paths, &shutdown)?;
    let classified = classify_all(&classifier, &composer, &FilenameOnlyInspector, files);

    let fingerprinter = Fingerprinter::new(ctx.config.duplicates.digest);
    let mut rows = Vec::with_capacity(classified.len());
    for item in classified {
        let mut row = ClassificationRow::new(&item.entry.path, &item.result, &item.suggested_name);
        if let Some(catalog) = &catalog {
            let fingerprint = fingerprinter.fingerprint(&item.entry.path);
            row = row.with_fingerprint(&fingerprint);
            let record = FileRecord::new(&item.entry.path)
                .with_fingerprint(&fingerprint)
                .with_classification(item.result, item.suggested_name);
            record_into(catalog, &record);
        }
        rows.push(row);
    }

    let exit_code = if errors.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::PartialSuccess
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Json => {
            ClassificationReport::new(rows, errors.len(), exit_code).write_to(&mut out, true)?;
        }
        OutputFormat::Csv => CsvOutput::new(&rows).write_to(&mut out)?,
        OutputFormat::Text => {
            for row in &rows {
                writeln!(
                    out,
                    "{}  {} {}",
                    row.category.cyan().bold(),
                    row.original_name,
                    format!("-> {}", row.suggested_name).dim()
                )?;
            }
            writeln!(out, "{} files classified, {} errors", rows.len(), errors.len())?;
        }
    }
    Ok(exit_code)
}

fn run_rename(ctx: &AppContext, args: RenameArgs) -> Result<ExitCode> {
    let classifier = ctx.classifier()?;
    let composer = NameComposer::new(args.naming.apply(ctx.config.naming_style()));
    let catalog = ctx.catalog(args.catalog.as_deref())?;
    let shutdown = install_handler().get_flag();

    let (files, errors) = gather(ctx, &args.paths, &shutdown)?;
    let classified = classify_all(&classifier, &composer, &FilenameOnlyInspector, files);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let (mut renamed, mut skipped, mut failed) = (0usize, 0usize, 0usize);

    // Sequential so that two files suggesting the same name cannot race.
    for item in classified {
        if shutdown.load(Ordering::SeqCst) {
            return Err(FinderError::Interrupted.into());
        }
        let plan = plan_rename(&item.entry.path, &item.suggested_file_name);

        if !args.apply {
            if plan.is_noop() {
                writeln!(out, "{} {}", "=".dim(), file_name(&plan.source))?;
            } else {
                writeln!(
                    out,
                    "{} {} -> {}",
                    "~".yellow(),
                    file_name(&plan.source),
                    plan.new_name
                )?;
            }
            if let Some(catalog) = &catalog {
                let record = FileRecord::new(&item.entry.path)
                    .with_classification(item.result, item.suggested_name);
                record_into(catalog, &record);
            }
            continue;
        }

        let outcome = apply_rename(&plan, args.overwrite);
        let new_name = (outcome.status == FileStatus::Renamed).then(|| plan.new_name.clone());
        match outcome.status {
            FileStatus::Renamed => {
                renamed += 1;
                writeln!(
                    out,
                    "{} {} -> {}",
                    "✓".green(),
                    file_name(&plan.source),
                    plan.new_name
                )?;
            }
            FileStatus::Error => {
                failed += 1;
                writeln!(
                    out,
                    "{} {}: {}",
                    "✗".red(),
                    file_name(&plan.source),
                    outcome.message.as_deref().unwrap_or("rename failed")
                )?;
            }
            FileStatus::Skipped | FileStatus::Pending => {
                skipped += 1;
                writeln!(
                    out,
                    "{} {} ({})",
                    "-".dim(),
                    file_name(&plan.source),
                    outcome.message.as_deref().unwrap_or("skipped")
                )?;
            }
        }

        if let Some(catalog) = &catalog {
            let record = FileRecord::new(&item.entry.path)
                .with_classification(item.result, item.suggested_name)
                .with_status(outcome.status, new_name);
            record_into(catalog, &record);
        }
    }

    if args.apply {
        writeln!(out, "{} renamed, {} skipped, {} failed", renamed, skipped, failed)?;
    }

    if failed > 0 || !errors.is_empty() {
        Ok(ExitCode::PartialSuccess)
    } else {
        Ok(ExitCode::Success)
    }
}

fn run_dupes(ctx: &AppContext, args: DupesArgs) -> Result<ExitCode> {
    if args.action.is_destructive() && !args.yes {
        bail!(
            "'{}' removes files; pass --yes to confirm",
            args.action.label()
        );
    }

    let quiet = ctx.quiet || args.output == ReportFormat::Json;
    let progress = Arc::new(Progress::new(quiet));
    let shutdown = install_handler().get_flag();
    let io_threads = ctx.io_threads(args.io_threads);

    let (files, scan_errors) = gather(ctx, &args.paths, &shutdown)?;

    let algorithm = args
        .digest
        .map_or(ctx.config.duplicates.digest, Into::into);
    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_io_threads(io_threads)
            .with_algorithm(algorithm)
            .with_shutdown_flag(Arc::clone(&shutdown))
            .with_progress_callback(progress.clone()),
    );
    let (groups, summary) = finder
        .find_duplicates(files)
        .context("duplicate scan failed")?;

    let mut pairs = pairs_from_groups(&groups);
    let resolution: Option<ResolutionReport> = if pairs.is_empty() {
        None
    } else {
        let resolver = Resolver::new(
            ResolveConfig::default()
                .with_marker(ctx.config.duplicates.marker.clone())
                .with_permanent(args.permanent || ctx.config.duplicates.permanent_delete)
                .with_verify_unchanged(ctx.config.duplicates.verify_unchanged)
                .with_io_threads(io_threads)
                .with_progress_callback(progress),
        );
        Some(
            resolver
                .apply(&mut pairs, args.action)
                .context("failed to resolve duplicates")?,
        )
    };

    let resolution_errors = resolution.as_ref().is_some_and(ResolutionReport::has_errors);
    let exit_code = if groups.is_empty() {
        ExitCode::NoDuplicates
    } else if resolution_errors || !scan_errors.is_empty() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.output {
        ReportFormat::Json => {
            DuplicateReport::new(&groups, &pairs, &summary, resolution, exit_code)
                .write_to(&mut out, true)?;
        }
        ReportFormat::Text => {
            for (index, group) in groups.iter().enumerate() {
                writeln!(
                    out,
                    "{} {} ({} files, {})",
                    format!("Group {}", index + 1).bold(),
                    group.digest_hex().dim(),
                    group.len(),
                    bytesize::ByteSize::b(group.files.first().map_or(0, |f| f.size))
                )?;
                for file in &group.files {
                    writeln!(out, "  {}", file.path.display())?;
                }
            }
            for pair in &pairs {
                let label = pair.status.label();
                let label = if pair.status.is_error() {
                    label.red().to_string()
                } else {
                    label.green().to_string()
                };
                writeln!(
                    out,
                    "[{}] {} <-> {}",
                    label,
                    file_name(&pair.canonical.path),
                    file_name(&pair.duplicate.path)
                )?;
            }
            writeln!(
                out,
                "{} files scanned ({}), {} duplicate groups, {} reclaimable",
                summary.total_files,
                summary.total_size_display(),
                summary.duplicate_groups,
                summary.reclaimable_display()
            )?;
            if let Some(report) = &resolution {
                writeln!(out, "{}", report.summary())?;
            }
        }
    }
    Ok(exit_code)
}

fn run_rules(ctx: &AppContext, command: RulesCommand) -> Result<ExitCode> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        RulesCommand::Validate { file } => {
            let rules = RuleSet::load(&file)
                .with_context(|| format!("rule file {} is invalid", file.display()))?;
            writeln!(
                out,
                "{} {}: {} categories, {} franchises, {} creators, {} special patterns",
                "valid".green().bold(),
                file.display(),
                rules.categories().len(),
                rules.franchises().len(),
                rules.creators().len(),
                rules.special_patterns().len()
            )?;
        }
        RulesCommand::Export { dest } => {
            let rules = ctx.load_rules()?;
            rules
                .export_to(&dest)
                .with_context(|| format!("failed to export rules to {}", dest.display()))?;
            writeln!(out, "Exported rules from {} to {}", rules.origin(), dest.display())?;
        }
        RulesCommand::Import { src } => {
            RuleSet::import_from(&src)
                .with_context(|| format!("refusing to import {}", src.display()))?;
            let Some(dest) = ctx
                .config
                .rules_path
                .clone()
                .or_else(Config::default_rules_path)
            else {
                bail!("no rule file location available; set rules_path in the config");
            };
            if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::copy(&src, &dest).with_context(|| {
                format!("failed to copy {} to {}", src.display(), dest.display())
            })?;
            writeln!(out, "Imported {} into {}", src.display(), dest.display())?;
        }
        RulesCommand::Test { name } => {
            let classifier = ctx.classifier()?;
            let composer = NameComposer::new(ctx.config.naming_style());
            let matches = classifier.matches(&name);
            let result = classifier.classify(&name);

            writeln!(out, "{}", name.bold())?;
            let categories: Vec<String> = matches
                .categories
                .iter()
                .map(|c| format!("{} ({})", c.category, c.priority))
                .collect();
            writeln!(out, "  matched categories: {}", categories.join(", "))?;
            let patterns: Vec<&str> = matches
                .special_patterns
                .iter()
                .map(|p| p.pattern_type.as_str())
                .collect();
            writeln!(out, "  special patterns:   {}", patterns.join(", "))?;
            writeln!(out, "  category:  {}", result.category.cyan())?;
            writeln!(out, "  franchise: {}", result.franchise.as_deref().unwrap_or("-"))?;
            writeln!(out, "  creator:   {}", result.creator.as_deref().unwrap_or("-"))?;
            writeln!(out, "  version:   {}", result.version.as_deref().unwrap_or("-"))?;
            let tags: Vec<&str> = result.tags.iter().map(String::as_str).collect();
            writeln!(out, "  tags:      {}", tags.join(", "))?;
            writeln!(out, "  nsfw:      {}", result.is_nsfw)?;
            writeln!(out, "  suggested: {}", composer.compose(&result).green())?;
        }
    }
    Ok(ExitCode::Success)
}
