//! PLH-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PlhError>;

/// Top-level error type for Project Liberation Helper.
#[derive(Debug, Error)]
pub enum PlhError {
    #[error("[PLH-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[PLH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[PLH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[PLH-2001] unusable input tree at {path}: {details}")]
    InvalidInput { path: PathBuf, details: String },

    #[error("[PLH-2002] pattern rule failure for {rule_id}: {details}")]
    Pattern {
        rule_id: &'static str,
        details: String,
    },

    #[error("[PLH-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[PLH-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PLH-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[PLH-3101] archive failure at {path}: {details}")]
    Archive { path: PathBuf, details: String },

    #[error("[PLH-3201] run cancelled")]
    Cancelled,

    #[error("[PLH-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl PlhError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "PLH-1001",
            Self::MissingConfig { .. } => "PLH-1002",
            Self::ConfigParse { .. } => "PLH-1003",
            Self::InvalidInput { .. } => "PLH-2001",
            Self::Pattern { .. } => "PLH-2002",
            Self::Serialization { .. } => "PLH-2101",
            Self::Io { .. } => "PLH-3002",
            Self::ChannelClosed { .. } => "PLH-3003",
            Self::Archive { .. } => "PLH-3101",
            Self::Cancelled => "PLH-3201",
            Self::Runtime { .. } => "PLH-3900",
        }
    }

    /// Whether retrying the whole run might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::Archive { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for PlhError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for PlhError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
