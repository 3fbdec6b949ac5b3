//! Configuration errors

use std::path::Path;

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration document errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("invalid config JSON in {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to write config {path}: {reason}")]
    Write { path: String, reason: String },
}

impl ConfigError {
    pub(crate) fn read(path: &Path, reason: impl ToString) -> Self {
        ConfigError::Read {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn parse(path: &Path, reason: impl ToString) -> Self {
        ConfigError::Parse {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: &Path, reason: impl ToString) -> Self {
        ConfigError::Write {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
