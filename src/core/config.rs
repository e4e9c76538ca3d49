//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{PlhError, Result};

/// Full plh configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub gate: GateConfig,
    pub scanner: ScannerConfig,
    pub output: OutputConfig,
    pub paths: PathsConfig,
}

/// Minimum-score gate policy. The gate is enforced by `audit`, never by
/// `liberate`, whose purpose is to repair low-scoring trees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GateConfig {
    /// When true, `audit` exits with the gate status code below threshold.
    pub enforce: bool,
    /// Minimum sovereignty score accepted by the gate.
    pub min_score: u8,
}

/// Scanner behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Worker threads for the per-file scan and clean pools.
    pub parallelism: usize,
    /// Files larger than this are exempt from content rules (path rules
    /// still apply), matching the binary-file treatment.
    pub max_file_size_bytes: u64,
}

/// Output tree and archive knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Suffix appended to the source directory name for the default output path.
    pub dir_suffix: String,
    /// Whether `liberate` produces the portable archive by default.
    pub archive: bool,
}

/// Filesystem paths used by plh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enforce: false,
            min_score: 60,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().saturating_div(2).max(1)),
            max_file_size_bytes: 4 * 1_048_576,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir_suffix: "-liberated".to_string(),
            archive: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[PLH-CONFIG] WARNING: HOME not set, falling back to /tmp for config path"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("plh").join("config.toml"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default path;
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| PlhError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(PlhError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `PLH_*` environment variable overrides on top of the file config.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_var("PLH_GATE_ENFORCE") {
            self.gate.enforce = parse_bool("PLH_GATE_ENFORCE", &value)?;
        }
        if let Some(value) = env_var("PLH_GATE_MIN_SCORE") {
            self.gate.min_score = value.parse().map_err(|_| PlhError::InvalidConfig {
                details: format!("PLH_GATE_MIN_SCORE must be an integer, got {value:?}"),
            })?;
        }
        if let Some(value) = env_var("PLH_SCANNER_PARALLELISM") {
            self.scanner.parallelism = value.parse().map_err(|_| PlhError::InvalidConfig {
                details: format!("PLH_SCANNER_PARALLELISM must be an integer, got {value:?}"),
            })?;
        }
        if let Some(value) = env_var("PLH_OUTPUT_ARCHIVE") {
            self.output.archive = parse_bool("PLH_OUTPUT_ARCHIVE", &value)?;
        }
        Ok(())
    }

    /// Reject configurations the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.gate.min_score > 100 {
            return Err(PlhError::InvalidConfig {
                details: format!(
                    "gate.min_score must be within 0..=100, got {}",
                    self.gate.min_score
                ),
            });
        }
        if self.scanner.parallelism == 0 {
            return Err(PlhError::InvalidConfig {
                details: "scanner.parallelism must be at least 1".to_string(),
            });
        }
        if self.output.dir_suffix.is_empty() || self.output.dir_suffix.contains('/') {
            return Err(PlhError::InvalidConfig {
                details: format!(
                    "output.dir_suffix must be a non-empty path component, got {:?}",
                    self.output.dir_suffix
                ),
            });
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PlhError::InvalidConfig {
            details: format!("{key} must be a boolean, got {other:?}"),
        }),
    }
}
