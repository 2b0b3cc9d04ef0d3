//! Configuration error types and validation traits.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or validating stage configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A model or configuration file does not exist.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// The configuration document could not be read or parsed.
    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Required configuration entries are absent.
    #[error("{stage} configuration is missing required fields: {}", fields.join(", "))]
    MissingFields { stage: String, fields: Vec<String> },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("resource limit exceeded: {message}")]
    ResourceLimitExceeded { message: String },
}

/// Checks run on a configuration before anything is built from it.
pub trait ConfigValidator {
    fn validate(&self) -> Result<(), ConfigError>;

    /// Validates that a file exists on disk.
    fn validate_path_exists(&self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            Err(ConfigError::PathNotFound {
                path: path.to_path_buf(),
            })
        } else if !path.is_file() {
            Err(ConfigError::InvalidConfig {
                message: format!("{} is not a file", path.display()),
            })
        } else {
            Ok(())
        }
    }

    /// Thread counts must be in `1..=256`.
    fn validate_thread_count(&self, thread_count: usize, field_name: &str) -> Result<(), ConfigError> {
        const MAX_REASONABLE_THREADS: usize = 256;

        if thread_count == 0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{field_name} must be greater than 0"),
            })
        } else if thread_count > MAX_REASONABLE_THREADS {
            Err(ConfigError::ResourceLimitExceeded {
                message: format!(
                    "{field_name} {thread_count} exceeds reasonable maximum of {MAX_REASONABLE_THREADS}"
                ),
            })
        } else {
            Ok(())
        }
    }

    fn validate_positive_usize(&self, value: usize, field_name: &str) -> Result<(), ConfigError> {
        if value == 0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{field_name} must be greater than 0"),
            })
        } else {
            Ok(())
        }
    }
}
