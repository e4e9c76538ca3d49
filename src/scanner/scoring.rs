//! Sovereignty scoring engine: fixed-weight, occurrence-based penalties with
//! build-hardening signals and discrete grade bands.
//!
//! The formula is a compatibility contract — weights must not drift:
//! start at 100, subtract 10 per critical issue, 2 per major issue, 5 per
//! failing hardening signal, 3 when dev tooling is not production-gated,
//! clamp to [0, 100]. Minor issues are advisory and cost nothing.

#![allow(missing_docs)]

use serde::Serialize;

use crate::core::tree::FileEntry;
use crate::scanner::report::ScanReport;

const CRITICAL_PENALTY: i64 = 10;
const MAJOR_PENALTY: i64 = 2;
const SIGNAL_PENALTY: i64 = 5;
const TOOLING_GATE_PENALTY: i64 = 3;

/// Boolean facts about the project's production build configuration.
///
/// Every signal defaults to passing; a tree without build config (including
/// the empty tree) scores from issues alone.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildSignals {
    /// Production output is minified.
    pub minified: bool,
    /// Chunk/module names carry content hashes rather than readable names.
    pub chunk_names_hashed: bool,
    /// Debug source maps are absent from production output.
    pub sourcemaps_disabled: bool,
    /// Developer-only tooling is gated behind a non-production condition.
    pub dev_tooling_gated: bool,
}

impl Default for BuildSignals {
    fn default() -> Self {
        Self {
            minified: true,
            chunk_names_hashed: true,
            sourcemaps_disabled: true,
            dev_tooling_gated: true,
        }
    }
}

impl BuildSignals {
    /// Detect signals from the tree's build-config files.
    #[must_use]
    pub fn detect(files: &[FileEntry]) -> Self {
        let mut signals = Self::default();

        for file in files {
            let name = file.file_name();
            let is_build_config = name.starts_with("vite.config.")
                || name.starts_with("webpack.config.")
                || name.starts_with("rollup.config.");
            let Some(text) = file.as_text() else {
                continue;
            };

            if is_build_config {
                if text.contains("minify: false") || text.contains("minify:false") {
                    signals.minified = false;
                }
                if text.contains("sourcemap: true") || text.contains("sourcemap:true") {
                    signals.sourcemaps_disabled = false;
                }
                if readable_chunk_names(text) {
                    signals.chunk_names_hashed = false;
                }
            }

            // Tagging plugins are fine in dev builds; ungated use leaks the
            // editor tooling into production bundles.
            if text.contains("componentTagger(") && !text.contains("development") {
                signals.dev_tooling_gated = false;
            }
        }

        signals
    }

    /// Names of failing signals, for gate diagnostics.
    #[must_use]
    pub fn failing(&self) -> Vec<&'static str> {
        let mut failing = Vec::new();
        if !self.minified {
            failing.push("minified");
        }
        if !self.chunk_names_hashed {
            failing.push("chunk-names-hashed");
        }
        if !self.sourcemaps_disabled {
            failing.push("sourcemaps-disabled");
        }
        if !self.dev_tooling_gated {
            failing.push("dev-tooling-gated");
        }
        failing
    }
}

fn readable_chunk_names(text: &str) -> bool {
    for key in ["chunkFileNames", "entryFileNames"] {
        if let Some(at) = text.find(key) {
            let tail = &text[at..text.len().min(at + 120)];
            if tail.contains("[name]") && !tail.contains("[hash]") {
                return true;
            }
        }
    }
    false
}

/// Discrete grade bands over the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grade {
    FullyCompliant,
    MinorCleanup,
    ModerateCleanup,
    FullCleanup,
}

impl Grade {
    #[must_use]
    pub const fn from_value(value: u8) -> Self {
        match value {
            95..=100 => Self::FullyCompliant,
            80..=94 => Self::MinorCleanup,
            60..=79 => Self::ModerateCleanup,
            _ => Self::FullCleanup,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FullyCompliant => "fully compliant",
            Self::MinorCleanup => "minor cleanup needed",
            Self::ModerateCleanup => "moderate cleanup required",
            Self::FullCleanup => "full cleanup required",
        }
    }
}

/// The sovereignty score: pure function of report + signals, no hidden state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    pub value: u8,
    pub grade: Grade,
}

/// Compute the sovereignty score.
#[must_use]
pub fn score(report: &ScanReport, signals: &BuildSignals) -> Score {
    let mut value: i64 = 100;

    #[allow(clippy::cast_possible_wrap)]
    {
        value -= CRITICAL_PENALTY * report.by_severity.critical as i64;
        value -= MAJOR_PENALTY * report.by_severity.major as i64;
    }

    if !signals.minified {
        value -= SIGNAL_PENALTY;
    }
    if !signals.chunk_names_hashed {
        value -= SIGNAL_PENALTY;
    }
    if !signals.sourcemaps_disabled {
        value -= SIGNAL_PENALTY;
    }
    if !signals.dev_tooling_gated {
        value -= TOOLING_GATE_PENALTY;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamped = value.clamp(0, 100) as u8;
    Score {
        value: clamped,
        grade: Grade::from_value(clamped),
    }
}
