//! Command-line interface for guardian.

use clap::{Parser, Subcommand};
use colored::*;
use globset::GlobSet;
use rayon::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::analyzer::{AnalysisResult, Analyzer};
use crate::ast::SUPPORTED_EXTENSIONS;
use crate::config::{self, AnalysisConfig, GuardianConfig, Strictness};
use crate::fix;
use crate::report::{self, Summary};
use crate::rules::RuleRegistry;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Constitutional static analysis for TypeScript and JavaScript.
///
/// Guardian flags code that breaks sovereignty and determinism policy:
/// untyped `any`, cloud telemetry, remote imports, nondeterministic APIs
/// and stray console logging.
#[derive(Parser)]
#[command(name = "guardian")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check source files against the constitutional rules
    #[command(visible_alias = "lint")]
    Check(CheckArgs),
    /// List the registered rules
    Rules,
}

/// Arguments for the check command.
#[derive(Parser)]
pub struct CheckArgs {
    /// Path to check (file or directory)
    pub path: PathBuf,

    /// Path to guardian.yaml (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty, json, or sarif
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Rule policy: strict, balanced, or lenient
    #[arg(short, long)]
    pub strictness: Option<String>,

    /// Seed for violation ids
    #[arg(long)]
    pub seed: Option<u64>,

    /// Only run these rules (repeatable)
    #[arg(short, long = "rule")]
    pub rules: Vec<String>,

    /// Apply available fixes in place
    #[arg(long)]
    pub fix: bool,
}

/// Load the config named on the command line, or discover one next to
/// the checked path, or fall back to defaults.
fn load_config(args: &CheckArgs, root: &Path) -> anyhow::Result<GuardianConfig> {
    let path = match &args.config {
        Some(p) => Some(p.clone()),
        None => {
            let dir = if root.is_dir() {
                root
            } else {
                root.parent().unwrap_or(root)
            };
            GuardianConfig::discover(dir)
        }
    };

    match path {
        Some(p) => {
            tracing::debug!(config = %p.display(), "loading config");
            GuardianConfig::parse_file(&p)
                .map_err(|e| anyhow::anyhow!("{}: {}", p.display(), e))
        }
        None => Ok(GuardianConfig::default()),
    }
}

/// Apply command-line overrides on top of the file config.
fn resolve_analysis_config(
    args: &CheckArgs,
    file_config: &GuardianConfig,
    registry: &RuleRegistry,
) -> anyhow::Result<AnalysisConfig> {
    let mut effective = file_config.clone();
    if let Some(s) = &args.strictness {
        effective.strictness = s.parse::<Strictness>().map_err(anyhow::Error::msg)?;
        // An explicit strictness on the command line wins over a rule list.
        effective.enabled_rules = None;
    }
    if !args.rules.is_empty() {
        for rule in &args.rules {
            if !registry.contains(rule) {
                anyhow::bail!("unknown rule {:?} (see 'guardian rules')", rule);
            }
        }
        effective.enabled_rules = Some(args.rules.clone());
        effective.disabled_rules.clear();
    }
    let resolved = effective.analysis_config(registry);
    Ok(match args.seed {
        Some(seed) => resolved.with_seed(seed),
        None => resolved,
    })
}

/// Collect source files under `root`.
pub fn collect_files(root: &Path, exclusions: &GlobSet) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            // Skip hidden directories and installed packages
            if e.file_type().is_dir() && e.depth() > 0 && (name.starts_with('.') || name == "node_modules") {
                return false;
            }
            true
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !SUPPORTED_EXTENSIONS.contains(&ext) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclusions.is_match(relative) || exclusions.is_match(path) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

#[cfg(feature = "tree-sitter")]
fn build_analyzer() -> anyhow::Result<Analyzer> {
    Ok(Analyzer::typescript())
}

#[cfg(not(feature = "tree-sitter"))]
fn build_analyzer() -> anyhow::Result<Analyzer> {
    anyhow::bail!("guardian was built without the tree-sitter feature; no parser is available")
}

/// Analyze one file, applying fixes first when asked.
fn check_file(
    analyzer: &Analyzer,
    path: &Path,
    config: &AnalysisConfig,
    apply_fixes: bool,
) -> anyhow::Result<AnalysisResult> {
    let source = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
    let file_path = path.to_string_lossy().to_string();
    let result = analyzer.analyze(&source, &file_path, config);

    if !apply_fixes || result.violations.iter().all(|v| v.fix.is_none()) {
        return Ok(result);
    }

    let outcome = fix::apply_fixes(&source, &result.violations)
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
    if !outcome.changed() {
        return Ok(result);
    }

    fs::write(path, &outcome.text)?;
    eprintln!(
        "Fixed {} violation(s) in {}{}",
        outcome.applied.len(),
        path.display(),
        if outcome.skipped.is_empty() {
            String::new()
        } else {
            format!(" ({} overlapping fix(es) skipped)", outcome.skipped.len())
        }
    );

    // Report what is left after the rewrite.
    Ok(analyzer.analyze(&outcome.text, &file_path, config))
}

/// Run the check command.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" && args.format != "sarif" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty', 'json', or 'sarif'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    // Resolve path
    let abs_path = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };

    let file_config = match load_config(args, &abs_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error parsing config: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let analyzer = build_analyzer()?;

    if let Err(e) = config::validate(&file_config, analyzer.registry()) {
        eprintln!("Error: invalid config: {}", e);
        return Ok(EXIT_ERROR);
    }

    let analysis_config = match resolve_analysis_config(args, &file_config, analyzer.registry()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Collect files to check
    let files = if abs_path.is_dir() {
        // validate() above has already compiled these once.
        collect_files(&abs_path, &file_config.exclusions()?)?
    } else {
        vec![abs_path.clone()]
    };

    if files.is_empty() {
        eprintln!("Warning: no files to check");
        return Ok(EXIT_SUCCESS);
    }

    tracing::debug!(
        files = files.len(),
        language = analyzer.language(),
        rules = analysis_config.enabled_rules.len(),
        "checking"
    );
    let mut results = files
        .par_iter()
        .map(|path| check_file(&analyzer, path, &analysis_config, args.fix))
        .collect::<anyhow::Result<Vec<_>>>()?;
    results.sort_by(|a, b| a.file_path.cmp(&b.file_path));

    // Output results
    let path_str = args.path.to_string_lossy().to_string();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.format.as_str() {
        "json" => report::write_json(&mut out, &path_str, &results)?,
        "sarif" => report::write_sarif(&mut out, &abs_path, &results, analyzer.registry())?,
        _ => report::write_pretty(&mut out, &path_str, &results)?,
    }
    out.flush()?;

    if Summary::from_results(&results).passed() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the rules command.
pub fn run_rules() -> anyhow::Result<i32> {
    let registry = RuleRegistry::builtin();
    println!("Registered rules:");
    println!();
    for rule in registry.all() {
        let severity = match rule.severity {
            crate::rules::Severity::Error => "error  ".red(),
            crate::rules::Severity::Warning => "warning".yellow(),
            crate::rules::Severity::Info => "info   ".blue(),
        };
        println!("  {:<24} {} {}", rule.id, severity, rule.summary);
    }
    println!();
    println!("Default strictness: {}", Strictness::default());
    Ok(EXIT_SUCCESS)
}
