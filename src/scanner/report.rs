//! Scan result shapes: flat issue list plus per-severity aggregates.

#![allow(missing_docs)]

use serde::Serialize;

use crate::scanner::patterns::RuleSeverity;

/// One detected lock-in marker. Produced fresh on every scan; never
/// persisted across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Tree-relative path of the flagged file.
    pub path: String,
    /// 1-based line number; 0 for path-level and whole-file matches.
    pub line: u32,
    /// Registry rule id.
    pub rule_id: &'static str,
    pub severity: RuleSeverity,
    /// The matched span, truncated for readability.
    pub matched_text: String,
    pub suggestion: &'static str,
}

/// Per-severity issue counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub major: usize,
    pub minor: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: RuleSeverity) {
        match severity {
            RuleSeverity::Critical => self.critical += 1,
            RuleSeverity::Major => self.major += 1,
            RuleSeverity::Minor => self.minor += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.critical + self.major + self.minor
    }
}

/// Aggregated scan output. Derived, recomputable, read-only downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub total_files: usize,
    pub total_lines: u64,
    pub issues: Vec<Issue>,
    pub by_severity: SeverityCounts,
    /// Files matched by any rule whose rewrite strategy removes the whole
    /// file; the Cleaner drops these unconditionally.
    pub flagged_paths: Vec<String>,
}

impl ScanReport {
    /// Assemble a report from raw worker output, normalizing to the
    /// canonical (path, line, rule id) ordering.
    #[must_use]
    pub fn assemble(
        total_files: usize,
        total_lines: u64,
        mut issues: Vec<Issue>,
        mut flagged_paths: Vec<String>,
    ) -> Self {
        issues.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.line.cmp(&b.line))
                .then_with(|| a.rule_id.cmp(b.rule_id))
        });
        flagged_paths.sort();
        flagged_paths.dedup();

        let mut by_severity = SeverityCounts::default();
        for issue in &issues {
            by_severity.record(issue.severity);
        }

        Self {
            total_files,
            total_lines,
            issues,
            by_severity,
            flagged_paths,
        }
    }

    /// Whether a given path was flagged for whole-file removal.
    #[must_use]
    pub fn is_flagged(&self, path: &str) -> bool {
        self.flagged_paths.binary_search_by(|p| p.as_str().cmp(path)).is_ok()
    }
}
