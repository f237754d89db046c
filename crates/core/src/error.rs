//! Core error types for epha.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use std::path::PathBuf;

use thiserror::Error;

/// The standard Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type.
#[derive(Debug, Error)]
pub enum Error {
    // I/O errors
    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    // Parsing errors
    #[error("TOML parse error: {reason}")]
    TomlParseFailed { reason: String },

    // Validation errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("invalid target: {reason}")]
    InvalidTarget { reason: String },
}

impl Error {
    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a TOML parse error.
    pub fn toml_parse_failed(reason: impl Into<String>) -> Self {
        Self::TomlParseFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid target error.
    pub fn invalid_target(reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_read_failed_mentions_path() {
        let err = Error::file_read_failed("/etc/epha.toml", "permission denied");
        let message = err.to_string();
        assert!(message.contains("/etc/epha.toml"));
        assert!(message.contains("permission denied"));
    }

    #[test]
    fn test_invalid_target_display() {
        let err = Error::invalid_target("kind must not be empty");
        assert_eq!(err.to_string(), "invalid target: kind must not be empty");
    }
}
