#![forbid(unsafe_code)]

//! Project Liberation Helper (plh) — removes AI-app-builder platform lock-in
//! from exported project trees.
//!
//! Four-stage pipeline:
//! 1. **Scan** — classify every file against the versioned lock-in rule registry
//! 2. **Score** — sovereignty score (0–100) from issue counts and build signals
//! 3. **Clean** — remove, rewrite, or pass through each file
//! 4. **Rebuild/Package** — synthesize deployment artifacts and a portable archive
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use project_liberation_helper::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use project_liberation_helper::scanner::patterns::PatternRegistry;
//! use project_liberation_helper::pipeline::{Pipeline, PipelineOptions};
//! ```

pub mod prelude;

pub mod archive;
pub mod cleaner;
pub mod core;
pub mod pipeline;
pub mod rebuild;
pub mod scanner;

#[cfg(test)]
mod pipeline_tests;
