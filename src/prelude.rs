//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use project_liberation_helper::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{PlhError, Result};
pub use crate::core::tree::{FileEntry, load_tree, write_tree};

// Scanner
pub use crate::scanner::patterns::{PatternRegistry, PatternRule, RuleCategory, RuleSeverity};
pub use crate::scanner::report::{Issue, ScanReport};
pub use crate::scanner::scan::{ScanOptions, scan};
pub use crate::scanner::scoring::{BuildSignals, Grade, Score, score};

// Cleaner
pub use crate::cleaner::{CleanAction, CleanOptions, CleanOutcome, clean};

// Rebuild + archive
pub use crate::archive::{ArchiveInfo, archive_tree};
pub use crate::rebuild::{Capabilities, GeneratedArtifacts, rebuild};

// Pipeline
pub use crate::pipeline::{LiberationRun, Pipeline, PipelineOptions, RunReport};
