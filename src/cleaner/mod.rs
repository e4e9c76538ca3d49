//! Cleaner: per-file remove/rewrite/keep decisions over the scanned tree.
//!
//! Decision order per file:
//! 1. whole-file removal (path rules + the vendor-only denylist)
//! 2. structured manifests get category-specific transforms
//! 3. source code gets the generic deep-clean pass
//! 4. env/markdown/shell text gets the light substitution pass
//! 5. everything else is copied through unchanged
//!
//! Running clean twice over the same input yields byte-identical output;
//! the second pass simply reports every file as kept.

#![allow(missing_docs)]

pub mod manifest;
pub mod source;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel as channel;
use parking_lot::Mutex;
use serde::Serialize;

use crate::cleaner::source::{POLYFILL_PATH, PassResult, polyfill_source};
use crate::core::errors::{PlhError, Result};
use crate::core::tree::FileEntry;
use crate::scanner::patterns::PatternRegistry;
use crate::scanner::report::ScanReport;

/// Work queue depth for the per-file pool.
const WORK_QUEUE_DEPTH: usize = 256;

/// Platform-pinned lockfiles: removed so the project re-resolves its
/// dependency graph without the platform registry's pinning.
const DENYLIST_FILES: [&str; 4] = [
    "bun.lockb",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
];

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Kept,
    Removed,
    Rewritten,
}

/// Per-file clean record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanAction {
    pub path: String,
    pub kind: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Tally of actions plus non-fatal warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanSummary {
    pub files_kept: usize,
    pub files_removed: usize,
    pub files_rewritten: usize,
    pub warnings: Vec<String>,
}

/// The Cleaner's full output: new file collection plus the action log.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub files: Vec<FileEntry>,
    pub actions: Vec<CleanAction>,
    pub summary: CleanSummary,
}

/// Cleaner tuning.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub parallelism: usize,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().saturating_div(2).max(1)),
        }
    }
}

/// File treatment classes, in decision order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileClass {
    PackageJson,
    TsConfig,
    BuildConfig,
    Html,
    Stylesheet,
    Source,
    Text,
    Opaque,
}

fn classify(file: &FileEntry) -> FileClass {
    if file.is_binary {
        return FileClass::Opaque;
    }
    let name = file.file_name();
    if name == "package.json" {
        return FileClass::PackageJson;
    }
    if name.starts_with("tsconfig") && name.ends_with(".json") {
        return FileClass::TsConfig;
    }
    if name.starts_with("vite.config.")
        || name.starts_with("webpack.config.")
        || name.starts_with("rollup.config.")
    {
        return FileClass::BuildConfig;
    }
    if name.starts_with(".env") {
        return FileClass::Text;
    }
    match file.extension().as_deref() {
        Some("html" | "htm") => FileClass::Html,
        Some("css" | "scss") => FileClass::Stylesheet,
        Some("ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" | "vue" | "svelte") => FileClass::Source,
        Some("md" | "markdown" | "txt" | "sh" | "yml" | "yaml" | "env") => FileClass::Text,
        _ => FileClass::Opaque,
    }
}

fn denylist_reason(file: &FileEntry) -> Option<&'static str> {
    DENYLIST_FILES
        .contains(&file.file_name())
        .then_some("platform-pinned lockfile")
}

/// Clean the tree. Reproducible: the same input and rule set always yield
/// byte-identical output files and the same action log.
pub fn clean(
    files: &[FileEntry],
    report: &ScanReport,
    registry: &PatternRegistry,
    options: &CleanOptions,
    cancel: &AtomicBool,
) -> Result<CleanOutcome> {
    let parallelism = options.parallelism.max(1);

    type Slot = (Option<FileEntry>, CleanAction);
    let slots: Mutex<Vec<Slot>> = Mutex::new(Vec::with_capacity(files.len()));
    let warnings: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let used_stub = AtomicBool::new(false);

    thread::scope(|scope| {
        let (work_tx, work_rx) = channel::bounded::<&FileEntry>(WORK_QUEUE_DEPTH);

        for _ in 0..parallelism {
            let work_rx = work_rx.clone();
            let slots = &slots;
            let warnings = &warnings;
            let used_stub = &used_stub;
            scope.spawn(move || {
                while let Ok(file) = work_rx.recv() {
                    if cancel.load(Ordering::Acquire) {
                        continue;
                    }
                    let decision = clean_file(file, report, registry);
                    if decision.used_stub {
                        used_stub.store(true, Ordering::Release);
                    }
                    if let Some(warning) = decision.warning {
                        warnings.lock().push(warning);
                    }
                    slots.lock().push((decision.file, decision.action));
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

    let mut slots = slots.into_inner();
    slots.sort_by(|a, b| a.1.path.cmp(&b.1.path));

    let mut out_files = Vec::new();
    let mut actions = Vec::new();
    for (file, action) in slots {
        if let Some(file) = file {
            out_files.push(file);
        }
        actions.push(action);
    }

    // The stub rewrite references the generated local client; make sure it
    // exists exactly once in the output tree.
    if used_stub.load(Ordering::Acquire) && !out_files.iter().any(|f| f.path == POLYFILL_PATH) {
        out_files.push(FileEntry::text(POLYFILL_PATH, polyfill_source()));
        actions.push(CleanAction {
            path: POLYFILL_PATH.to_string(),
            kind: ActionKind::Rewritten,
            details: Some("generated local client polyfill".to_string()),
        });
        out_files.sort_by(|a, b| a.path.cmp(&b.path));
        actions.sort_by(|a, b| a.path.cmp(&b.path));
    }

    let mut summary = CleanSummary {
        warnings: warnings.into_inner(),
        ..CleanSummary::default()
    };
    summary.warnings.sort();
    for action in &actions {
        match action.kind {
            ActionKind::Kept => summary.files_kept += 1,
            ActionKind::Removed => summary.files_removed += 1,
            ActionKind::Rewritten => summary.files_rewritten += 1,
        }
    }

    Ok(CleanOutcome {
        files: out_files,
        actions,
        summary,
    })
}

struct FileDecision {
    file: Option<FileEntry>,
    action: CleanAction,
    warning: Option<String>,
    used_stub: bool,
}

fn kept(file: &FileEntry, details: Option<String>) -> FileDecision {
    FileDecision {
        file: Some(file.clone()),
        action: CleanAction {
            path: file.path.clone(),
            kind: ActionKind::Kept,
            details,
        },
        warning: None,
        used_stub: false,
    }
}

fn clean_file(file: &FileEntry, report: &ScanReport, registry: &PatternRegistry) -> FileDecision {
    // 1. Whole-file removal wins over everything, content included.
    if report.is_flagged(&file.path) {
        return FileDecision {
            file: None,
            action: CleanAction {
                path: file.path.clone(),
                kind: ActionKind::Removed,
                details: Some("matched whole-file removal rule".to_string()),
            },
            warning: None,
            used_stub: false,
        };
    }
    if let Some(reason) = denylist_reason(file) {
        return FileDecision {
            file: None,
            action: CleanAction {
                path: file.path.clone(),
                kind: ActionKind::Removed,
                details: Some(reason.to_string()),
            },
            warning: None,
            used_stub: false,
        };
    }

    let Some(text) = file.as_text() else {
        return kept(file, None);
    };

    // 2–4. Category-specific, deep, or light rewrite passes.
    let result = match classify(file) {
        FileClass::PackageJson => match manifest::clean_package_json(text) {
            Ok(result) => result,
            Err(err) => return parse_fallback(file, &err),
        },
        FileClass::TsConfig => match manifest::clean_tsconfig(text) {
            Ok(result) => result,
            Err(err) => return parse_fallback(file, &err),
        },
        FileClass::BuildConfig => source::clean_build_config(text, registry),
        FileClass::Html => manifest::clean_html(text, registry),
        FileClass::Stylesheet => manifest::clean_stylesheet(text, registry),
        FileClass::Source => source::deep_clean(text, registry),
        FileClass::Text => source::light_clean(text, registry),
        FileClass::Opaque => PassResult::default(),
    };

    match result.content {
        Some(content) => FileDecision {
            file: Some(FileEntry::text(file.path.clone(), &content)),
            action: CleanAction {
                path: file.path.clone(),
                kind: ActionKind::Rewritten,
                details: Some(result.changes.join("; ")),
            },
            warning: None,
            used_stub: result.used_stub,
        },
        None => kept(file, None),
    }
}

/// Failure policy: a manifest that cannot be transformed safely is copied
/// through unchanged and surfaced as a non-fatal warning.
fn parse_fallback(file: &FileEntry, err: &PlhError) -> FileDecision {
    let mut decision = kept(
        file,
        Some("unparseable manifest copied unchanged".to_string()),
    );
    decision.warning = Some(format!("{}: {err}", file.path));
    decision
}
