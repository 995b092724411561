//! Failure kinds surfaced by a fill run.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a fill run.
///
/// Lookup misses are not errors: they are collected in the fill report and only become
/// [`FillError::Unresolved`] when strict mode asks for it.
#[derive(Debug, Error)]
pub enum FillError {
    /// Configuration file or command-line values are unusable.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Input JSON missing, unreadable or malformed.
    #[error("failed to load data from {path}: {message}")]
    DataLoad { path: PathBuf, message: String },

    /// Template missing or not a word-processing package.
    #[error("failed to load template {path}: {message}")]
    TemplateLoad { path: PathBuf, message: String },

    /// Filling the template failed part way.
    #[error("failed to fill template: {message}")]
    Fill { message: String },

    /// Output could not be written.
    #[error("failed to save {path}: {message}")]
    Save { path: PathBuf, message: String },

    /// Strict mode and at least one marker stayed unresolved.
    #[error("{} unresolved marker(s): {}", markers.len(), markers.join(", "))]
    Unresolved { markers: Vec<String> },
}

impl FillError {
    pub fn config(err: anyhow::Error) -> Self {
        Self::Config {
            message: format!("{err:#}"),
        }
    }

    pub fn data_load(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        Self::DataLoad {
            path: path.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn template_load(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        Self::TemplateLoad {
            path: path.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn fill(err: anyhow::Error) -> Self {
        Self::Fill {
            message: format!("{err:#}"),
        }
    }

    pub fn save(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        Self::Save {
            path: path.into(),
            message: format!("{err:#}"),
        }
    }

    /// Process exit code for this failure. Success is `0`.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } => 1,
            Self::DataLoad { .. } => 2,
            Self::TemplateLoad { .. } => 3,
            Self::Save { .. } => 4,
            Self::Unresolved { .. } => 5,
            Self::Fill { .. } => 6,
        }
    }
}
