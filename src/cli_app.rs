//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use project_liberation_helper::cleaner::ActionKind;
use project_liberation_helper::core::config::Config;
use project_liberation_helper::core::tree::{FileEntry, load_tree};
use project_liberation_helper::pipeline::{LiberationRun, Pipeline, PipelineOptions};
use project_liberation_helper::scanner::patterns::{PatternRegistry, RuleSeverity};
use project_liberation_helper::scanner::report::ScanReport;
use project_liberation_helper::scanner::scan::{ScanOptions, scan};
use project_liberation_helper::scanner::scoring::{BuildSignals, Score, score};

/// Project Liberation Helper — removes platform lock-in from exported app trees.
#[derive(Debug, Parser)]
#[command(
    name = "plh",
    author,
    version,
    about = "Project Liberation Helper - platform lock-in remover",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Scan a project tree for lock-in markers.
    Scan(ScanArgs),
    /// Scan, score, and optionally gate on the sovereignty score.
    Audit(AuditArgs),
    /// Run the full liberation pipeline: scan, score, clean, rebuild, archive.
    Liberate(LiberateArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Project tree to scan.
    #[arg(value_name = "PATH")]
    path: PathBuf,
    /// Maximum number of issues to display (human output only).
    #[arg(long, default_value_t = 50, value_name = "N")]
    top: usize,
}

#[derive(Debug, Clone, Args)]
struct AuditArgs {
    /// Project tree to audit.
    #[arg(value_name = "PATH")]
    path: PathBuf,
    /// Enforce the minimum-score gate (exit code 4 below threshold).
    #[arg(long)]
    gate: bool,
    /// Override the configured gate threshold.
    #[arg(long, value_name = "SCORE")]
    min_score: Option<u8>,
}

#[derive(Debug, Clone, Args)]
struct LiberateArgs {
    /// Project tree to liberate.
    #[arg(value_name = "PATH")]
    path: PathBuf,
    /// Output directory for the cleaned tree (default: `<PATH><suffix>`).
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,
    /// Project name for generated artifacts (default: input directory name).
    #[arg(long, value_name = "NAME")]
    name: Option<String>,
    /// Scan and score only; write nothing.
    #[arg(long)]
    dry_run: bool,
    /// Skip the portable archive.
    #[arg(long)]
    no_archive: bool,
}

#[derive(Debug, Clone, Args)]
struct VersionArgs {
    /// Include additional build metadata fields.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Sovereignty score below the enforced gate threshold.
    #[error("{0}")]
    Gate(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI. The gate rejection is a
    /// policy outcome, not an error, and gets its own documented code.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Gate(_) => 4,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Scan(args) => run_scan(cli, args),
        Command::Audit(args) => run_audit(cli, args),
        Command::Liberate(args) => run_liberate(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn load_inputs(cli: &Cli, path: &Path) -> Result<(Config, Vec<FileEntry>), CliError> {
    let config =
        Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))?;
    let files = load_tree(path).map_err(|e| CliError::User(e.to_string()))?;
    Ok((config, files))
}

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let (config, files) = load_inputs(cli, &args.path)?;
    let start = std::time::Instant::now();

    let registry = PatternRegistry::builtin();
    let scan_options = ScanOptions {
        parallelism: config.scanner.parallelism,
        max_file_size_bytes: config.scanner.max_file_size_bytes,
    };
    let report = scan(&files, &registry, &scan_options, &AtomicBool::new(false))
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let elapsed = start.elapsed();

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "Lock-in Scan Results\n  Scanned: {} files ({} lines) in {:.1}s\n  Issues: {} ({} critical, {} major, {} minor)\n",
                report.total_files,
                report.total_lines,
                elapsed.as_secs_f64(),
                report.by_severity.total(),
                report.by_severity.critical,
                report.by_severity.major,
                report.by_severity.minor,
            );
            print_issue_table(&report, args.top, cli.verbose);
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "scan",
                "path": args.path.to_string_lossy(),
                "elapsed_seconds": elapsed.as_secs_f64(),
                "report": serde_json::to_value(&report)?,
            });
            write_json_line(&payload)?;
        }
    }

    Ok(())
}

fn run_audit(cli: &Cli, args: &AuditArgs) -> Result<(), CliError> {
    let (config, files) = load_inputs(cli, &args.path)?;

    let registry = PatternRegistry::builtin();
    let scan_options = ScanOptions {
        parallelism: config.scanner.parallelism,
        max_file_size_bytes: config.scanner.max_file_size_bytes,
    };
    let report = scan(&files, &registry, &scan_options, &AtomicBool::new(false))
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let signals = BuildSignals::detect(&files);
    let audit_score = score(&report, &signals);

    let threshold = args.min_score.unwrap_or(config.gate.min_score);
    let enforce = args.gate || config.gate.enforce;

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "Sovereignty Audit\n  Score: {} ({})\n  Issues: {} critical, {} major, {} minor",
                paint_score(audit_score),
                audit_score.grade.label(),
                report.by_severity.critical,
                report.by_severity.major,
                report.by_severity.minor,
            );
            let failing = signals.failing();
            if failing.is_empty() {
                println!("  Build signals: all passing");
            } else {
                println!("  Build signals failing: {}", failing.join(", "));
            }
            if cli.verbose {
                println!();
                print_issue_table(&report, usize::MAX, true);
            }
            if enforce {
                println!("\n  Gate: threshold {threshold}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "audit",
                "path": args.path.to_string_lossy(),
                "score": audit_score.value,
                "grade": audit_score.grade,
                "by_severity": report.by_severity,
                "failing_signals": signals.failing(),
                "gate": { "enforced": enforce, "threshold": threshold },
                "report": serde_json::to_value(&report)?,
            });
            write_json_line(&payload)?;
        }
    }

    if enforce && audit_score.value < threshold {
        let failing = signals.failing();
        let detail = if failing.is_empty() {
            String::new()
        } else {
            format!("; failing signals: {}", failing.join(", "))
        };
        return Err(CliError::Gate(format!(
            "score {} below gate threshold {threshold}{detail}",
            audit_score.value
        )));
    }

    Ok(())
}

fn run_liberate(cli: &Cli, args: &LiberateArgs) -> Result<(), CliError> {
    let (config, files) = load_inputs(cli, &args.path)?;

    let project_name = args.name.clone().unwrap_or_else(|| {
        args.path
            .file_name()
            .map_or_else(|| "liberated-app".to_string(), |n| n.to_string_lossy().into_owned())
    });
    let output_dir = args.output.clone().unwrap_or_else(|| {
        let mut name = args
            .path
            .file_name()
            .map_or_else(|| "liberated".to_string(), |n| n.to_string_lossy().into_owned());
        name.push_str(&config.output.dir_suffix);
        args.path.with_file_name(name)
    });

    let options = PipelineOptions {
        project_name,
        output_dir,
        dry_run: args.dry_run,
        no_archive: args.no_archive || !config.output.archive,
        parallelism: config.scanner.parallelism,
        max_file_size_bytes: config.scanner.max_file_size_bytes,
    };

    let run = Pipeline::new()
        .run(&files, &options, &AtomicBool::new(false))
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    match output_mode(cli) {
        OutputMode::Human => print_run_summary(&run, cli.verbose),
        OutputMode::Json => {
            let payload = serde_json::to_value(&run.report)?;
            write_json_line(&payload)?;
        }
    }

    Ok(())
}

fn print_issue_table(report: &ScanReport, top: usize, show_suggestions: bool) {
    if report.issues.is_empty() {
        println!("  No lock-in markers found.");
        return;
    }

    println!(
        "  {:<40}  {:>5}  {:<10}  {:<24}",
        "Path", "Line", "Severity", "Rule"
    );
    println!("  {}", "-".repeat(86));
    for issue in report.issues.iter().take(top) {
        // Pad before colorizing so escape codes do not skew the columns.
        let severity = paint_severity(issue.severity);
        println!(
            "  {:<40}  {:>5}  {}  {:<24}",
            truncate_left(&issue.path, 40),
            issue.line,
            severity,
            issue.rule_id,
        );
        if show_suggestions {
            println!("      {}", issue.suggestion.dimmed());
        }
    }
    if report.issues.len() > top {
        println!("  ... and {} more", report.issues.len() - top);
    }
}

fn print_run_summary(run: &LiberationRun, verbose: bool) {
    let report = &run.report;
    println!(
        "Liberation Run — {}\n  Score: {} ({})\n  Issues: {} critical, {} major, {} minor",
        report.project,
        paint_score(run.score),
        run.score.grade.label(),
        report.by_severity.critical,
        report.by_severity.major,
        report.by_severity.minor,
    );

    if report.dry_run {
        println!("  Dry run: no files written, no archive produced.");
        return;
    }

    println!(
        "  Actions: {} removed, {} rewritten, {} kept",
        report.files_removed, report.files_rewritten, report.files_kept
    );
    if let Some(dir) = &report.output_dir {
        println!("  Output: {dir}");
    }
    if let Some(archive) = &report.archive {
        println!(
            "  Archive: {} ({}, sha256 {})",
            archive.path,
            format_bytes(archive.size_bytes),
            &archive.sha256[..12.min(archive.sha256.len())],
        );
    }
    if !report.warnings.is_empty() {
        println!("  Warnings:");
        for warning in &report.warnings {
            println!("    {}", warning.yellow());
        }
    }

    if verbose && let Some(outcome) = &run.clean {
        println!("\n  Per-file actions:");
        for action in &outcome.actions {
            let label = match action.kind {
                ActionKind::Kept => format!("{:<10}", "kept").normal(),
                ActionKind::Removed => format!("{:<10}", "removed").red(),
                ActionKind::Rewritten => format!("{:<10}", "rewritten").yellow(),
            };
            match &action.details {
                Some(details) => println!("    {label} {}  ({details})", action.path),
                None => println!("    {label} {}", action.path),
            }
        }
    }
}

fn paint_severity(severity: RuleSeverity) -> String {
    let padded = format!("{:<10}", severity.as_str());
    match severity {
        RuleSeverity::Critical => padded.red().to_string(),
        RuleSeverity::Major => padded.yellow().to_string(),
        RuleSeverity::Minor => padded.dimmed().to_string(),
    }
}

fn paint_score(score: Score) -> String {
    let rendered = score.value.to_string();
    match score.value {
        95..=100 => rendered.green().to_string(),
        60..=94 => rendered.yellow().to_string(),
        _ => rendered.red().to_string(),
    }
}

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;

    #[allow(clippy::cast_precision_loss)]
    if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn truncate_left(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        format!("...{}", &text[text.len() - (max_len - 3)..])
    }
}

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("plh {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "plh",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("PLH_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        Some("auto") | None => fallback,
        Some(_) => fallback,
    }
}
