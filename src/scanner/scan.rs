//! Parallel per-file scan over the in-memory tree.
//!
//! Files are fanned out to a bounded worker pool; workers append into
//! lock-protected accumulators and the final report is re-sorted into the
//! canonical (path, line, rule id) order, so results are byte-for-byte
//! deterministic regardless of scheduling. The scan has no side effects.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use crossbeam_channel as channel;
use parking_lot::Mutex;

use crate::core::errors::{PlhError, Result};
use crate::core::tree::FileEntry;
use crate::scanner::patterns::{PatternRegistry, RewriteStrategy, RuleMatcher};
use crate::scanner::report::{Issue, ScanReport};

/// Inline marker that exempts a single line from content rules.
pub const ALLOW_MARKER: &str = "plh:allow";
/// Opens a documentation block exempt from content rules.
pub const DOCS_BEGIN_MARKER: &str = "plh:docs-begin";
/// Closes a documentation block.
pub const DOCS_END_MARKER: &str = "plh:docs-end";

/// Longest matched span recorded verbatim in an issue.
const MATCH_PREVIEW_CHARS: usize = 160;

/// Work queue depth; keeps the producer from racing far ahead of workers.
const WORK_QUEUE_DEPTH: usize = 256;

/// Scan tuning derived from `ScannerConfig`.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub parallelism: usize,
    /// Files larger than this skip content rules (path rules still apply).
    pub max_file_size_bytes: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().saturating_div(2).max(1)),
            max_file_size_bytes: 4 * 1_048_576,
        }
    }
}

/// Scan a tree against the registry.
///
/// Deterministic: the same input tree yields an identical `ScanReport`.
/// Cancellation is cooperative — the flag is checked between files and the
/// run fails with [`PlhError::Cancelled`] without partial results.
pub fn scan(
    files: &[FileEntry],
    registry: &PatternRegistry,
    options: &ScanOptions,
    cancel: &AtomicBool,
) -> Result<ScanReport> {
    let parallelism = options.parallelism.max(1);

    let issues: Mutex<Vec<Issue>> = Mutex::new(Vec::new());
    let flagged: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let total_lines = AtomicU64::new(0);

    thread::scope(|scope| {
        let (work_tx, work_rx) = channel::bounded::<&FileEntry>(WORK_QUEUE_DEPTH);

        for _ in 0..parallelism {
            let work_rx = work_rx.clone();
            let issues = &issues;
            let flagged = &flagged;
            let total_lines = &total_lines;
            scope.spawn(move || {
                while let Ok(file) = work_rx.recv() {
                    if cancel.load(Ordering::Acquire) {
                        // Drain without scanning so the producer unblocks.
                        continue;
                    }
                    let outcome = scan_file(file, registry, options.max_file_size_bytes);
                    total_lines.fetch_add(outcome.lines, Ordering::Relaxed);
                    if !outcome.issues.is_empty() {
                        issues.lock().extend(outcome.issues);
                    }
                    if outcome.remove_whole_file {
                        flagged.lock().push(file.path.clone());
                    }
                }
            });
        }

        for file in files {
            if cancel.load(Ordering::Acquire) {
                break;
            }
            if work_tx.send(file).is_err() {
                break;
            }
        }
        drop(work_tx);
    });

    if cancel.load(Ordering::Acquire) {
        return Err(PlhError::Cancelled);
    }

    Ok(ScanReport::assemble(
        files.len(),
        total_lines.into_inner(),
        issues.into_inner(),
        flagged.into_inner(),
    ))
}

struct FileScanOutcome {
    issues: Vec<Issue>,
    remove_whole_file: bool,
    lines: u64,
}

fn scan_file(file: &FileEntry, registry: &PatternRegistry, max_size: u64) -> FileScanOutcome {
    let mut issues = Vec::new();
    let mut remove_whole_file = false;

    // Path rules apply to every file, binary or not.
    for rule in registry.path_rules() {
        let RuleMatcher::Path(regex) = &rule.matcher else {
            continue;
        };
        if regex.is_match(&file.path) {
            issues.push(Issue {
                path: file.path.clone(),
                line: 0,
                rule_id: rule.id,
                severity: rule.severity,
                matched_text: preview(&file.path),
                suggestion: rule.suggestion,
            });
            if rule.rewrite == RewriteStrategy::RemoveFile {
                remove_whole_file = true;
            }
        }
    }

    // Content rules apply to text files within the size limit.
    let mut lines = 0u64;
    if file.content.len() as u64 <= max_size
        && let Some(text) = file.as_text()
    {
        let mut in_docs_block = false;
        for (index, line) in text.lines().enumerate() {
            lines += 1;
            if line.contains(DOCS_BEGIN_MARKER) {
                in_docs_block = true;
                continue;
            }
            if line.contains(DOCS_END_MARKER) {
                in_docs_block = false;
                continue;
            }
            if is_suppressed(line, in_docs_block) {
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let line_number = (index + 1) as u32;
            for rule in registry.content_rules() {
                let RuleMatcher::Content(regex) = &rule.matcher else {
                    continue;
                };
                if let Some(found) = regex.find(line) {
                    issues.push(Issue {
                        path: file.path.clone(),
                        line: line_number,
                        rule_id: rule.id,
                        severity: rule.severity,
                        matched_text: preview(found.as_str()),
                        suggestion: rule.suggestion,
                    });
                }
            }
        }
    }

    FileScanOutcome {
        issues,
        remove_whole_file,
        lines,
    }
}

/// False-positive suppression: a line is exempt when it sits inside a
/// documentation block, carries the inline allow marker, or looks like one
/// of the registry's own serialized rule records (so scanning a project
/// that embeds a copy of this tool does not flag the tool's rule data).
fn is_suppressed(line: &str, in_docs_block: bool) -> bool {
    in_docs_block || line.contains(ALLOW_MARKER) || looks_like_rule_record(line)
}

fn looks_like_rule_record(line: &str) -> bool {
    line.contains("\"ruleId\"") && line.contains("\"severity\"")
}

fn preview(text: &str) -> String {
    if text.chars().count() <= MATCH_PREVIEW_CHARS {
        text.to_string()
    } else {
        text.chars().take(MATCH_PREVIEW_CHARS).collect()
    }
}
