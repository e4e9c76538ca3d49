//! Pipeline orchestrator: Scan → Score → Clean → Rebuild → Archive.
//!
//! Stages are pure functions over the in-memory tree; this module owns the
//! only disk writes (cleaned tree + archive) and the machine-readable run
//! report. Re-running against the same input is idempotent, and
//! cancellation between files never leaves partial output behind. An
//! archive failure, by contrast, leaves the already-written cleaned tree on
//! disk — it stays valid and usable without the archive.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::archive::{ArchiveInfo, archive_tree};
use crate::cleaner::{CleanOptions, CleanOutcome, clean};
use crate::core::errors::{PlhError, Result};
use crate::core::tree::{FileEntry, write_tree};
use crate::rebuild::{Capabilities, rebuild};
use crate::scanner::patterns::PatternRegistry;
use crate::scanner::report::{ScanReport, SeverityCounts};
use crate::scanner::scan::{ScanOptions, scan};
use crate::scanner::scoring::{BuildSignals, Grade, Score, score};

/// Everything `liberate` needs to know up front.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub project_name: String,
    /// Resolved output directory for the cleaned tree.
    pub output_dir: PathBuf,
    /// Scan + Score only; no writes of any kind.
    pub dry_run: bool,
    /// Skip the archive stage (cleaned tree is still written).
    pub no_archive: bool,
    pub parallelism: usize,
    pub max_file_size_bytes: u64,
}

/// Archive facts for the run report.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveRecord {
    pub path: String,
    pub sha256: String,
    pub size_bytes: u64,
}

impl From<&ArchiveInfo> for ArchiveRecord {
    fn from(info: &ArchiveInfo) -> Self {
        Self {
            path: info.path.to_string_lossy().into_owned(),
            sha256: info.sha256.clone(),
            size_bytes: info.size_bytes,
        }
    }
}

/// Machine-readable run report; the human summary renders the same data.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub duration_ms: u64,
    pub dry_run: bool,
    pub project: String,
    pub total_files: usize,
    pub total_lines: u64,
    pub by_severity: SeverityCounts,
    pub score: u8,
    pub grade: Grade,
    pub failing_signals: Vec<&'static str>,
    pub files_kept: usize,
    pub files_removed: usize,
    pub files_rewritten: usize,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveRecord>,
}

/// Full result of one pipeline run.
#[derive(Debug)]
pub struct LiberationRun {
    pub scan_report: ScanReport,
    pub signals: BuildSignals,
    pub score: Score,
    pub clean: Option<CleanOutcome>,
    pub archive: Option<ArchiveInfo>,
    pub report: RunReport,
}

/// The liberation pipeline, bound to one read-only rule registry.
#[derive(Debug, Default)]
pub struct Pipeline {
    registry: PatternRegistry,
}

impl Pipeline {
    /// Pipeline over the built-in registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: PatternRegistry::builtin(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Run the full pipeline over an in-memory tree.
    pub fn run(
        &self,
        files: &[FileEntry],
        options: &PipelineOptions,
        cancel: &AtomicBool,
    ) -> Result<LiberationRun> {
        let start = Instant::now();
        let started_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let scan_options = ScanOptions {
            parallelism: options.parallelism,
            max_file_size_bytes: options.max_file_size_bytes,
        };
        let scan_report = scan(files, &self.registry, &scan_options, cancel)?;
        let signals = BuildSignals::detect(files);
        let run_score = score(&scan_report, &signals);

        if options.dry_run {
            let report = assemble_report(
                &started_at,
                start,
                options,
                &scan_report,
                &signals,
                run_score,
                None,
                None,
                None,
            );
            return Ok(LiberationRun {
                scan_report,
                signals,
                score: run_score,
                clean: None,
                archive: None,
                report,
            });
        }

        let clean_options = CleanOptions {
            parallelism: options.parallelism,
        };
        let mut outcome = clean(files, &scan_report, &self.registry, &clean_options, cancel)?;

        // Rebuilder artifacts join the cleaned tree; a generated artifact
        // always supersedes a leftover platform one with the same path.
        let capabilities = Capabilities::detect(&outcome.files);
        let artifacts = rebuild(&options.project_name, &capabilities);
        for artifact in artifacts.files {
            outcome.files.retain(|f| f.path != artifact.path);
            outcome.files.push(artifact);
        }
        outcome.files.sort_by(|a, b| a.path.cmp(&b.path));

        let created_output = !options.output_dir.exists();
        if let Err(err) = write_tree(&options.output_dir, &outcome.files) {
            discard_output(&options.output_dir, created_output);
            return Err(err);
        }

        if cancel.load(std::sync::atomic::Ordering::Acquire) {
            discard_output(&options.output_dir, created_output);
            return Err(PlhError::Cancelled);
        }

        let archive = if options.no_archive {
            None
        } else {
            // Archive failure is not fatal to the cleaned tree: it stays on
            // disk; the archiver already discarded its own partial output.
            Some(archive_tree(
                &options.output_dir,
                &options.project_name,
                &archive_destination(&options.output_dir),
            )?)
        };

        let report = assemble_report(
            &started_at,
            start,
            options,
            &scan_report,
            &signals,
            run_score,
            Some(&outcome),
            Some(&options.output_dir),
            archive.as_ref(),
        );

        Ok(LiberationRun {
            scan_report,
            signals,
            score: run_score,
            clean: Some(outcome),
            archive,
            report,
        })
    }
}

/// `<output-dir>.tar.gz`, next to the output tree.
#[must_use]
pub fn archive_destination(output_dir: &Path) -> PathBuf {
    let mut name = output_dir
        .file_name()
        .map_or_else(|| "liberated".to_string(), |n| n.to_string_lossy().into_owned());
    name.push_str(".tar.gz");
    output_dir.with_file_name(name)
}

fn discard_output(output_dir: &Path, created: bool) {
    if created {
        let _ = fs::remove_dir_all(output_dir);
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_report(
    started_at: &str,
    start: Instant,
    options: &PipelineOptions,
    scan_report: &ScanReport,
    signals: &BuildSignals,
    run_score: Score,
    outcome: Option<&CleanOutcome>,
    output_dir: Option<&Path>,
    archive: Option<&ArchiveInfo>,
) -> RunReport {
    let summary = outcome.map(|o| &o.summary);
    RunReport {
        started_at: started_at.to_string(),
        duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        dry_run: options.dry_run,
        project: options.project_name.clone(),
        total_files: scan_report.total_files,
        total_lines: scan_report.total_lines,
        by_severity: scan_report.by_severity,
        score: run_score.value,
        grade: run_score.grade,
        failing_signals: signals.failing(),
        files_kept: summary.map_or(0, |s| s.files_kept),
        files_removed: summary.map_or(0, |s| s.files_removed),
        files_rewritten: summary.map_or(0, |s| s.files_rewritten),
        warnings: summary.map_or_else(Vec::new, |s| s.warnings.clone()),
        output_dir: output_dir.map(|p| p.to_string_lossy().into_owned()),
        archive: archive.map(ArchiveRecord::from),
    }
}
