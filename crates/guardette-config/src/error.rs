//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or watching configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key has no value.
    #[error("missing required configuration value: {key}")]
    Missing {
        /// The missing key.
        key: String,
    },

    /// A key holds a value that cannot be interpreted.
    #[error("invalid configuration value for {key}: {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Explanation of why the value is invalid.
        reason: String,
    },

    /// A referenced file does not exist.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A `.env` file could not be parsed.
    #[error("failed to read environment file {path}: {reason}")]
    EnvFile {
        /// Path to the file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The file watcher could not be set up.
    #[error("file watcher error: {0}")]
    Watch(String),
}

impl ConfigError {
    /// Create a new missing value error.
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    /// Create a new invalid value error.
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Returns the configuration key involved, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Missing { key } | Self::InvalidValue { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_error() {
        let err = ConfigError::missing("CLIENT_SECRET");
        assert_eq!(
            err.to_string(),
            "missing required configuration value: CLIENT_SECRET"
        );
        assert_eq!(err.key(), Some("CLIENT_SECRET"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value("PROXY_CLIENT_TIMEOUT_SECS", "expected integer");
        assert!(err.to_string().contains("PROXY_CLIENT_TIMEOUT_SECS"));
        assert!(err.to_string().contains("expected integer"));
    }

    #[test]
    fn test_file_not_found_has_no_key() {
        let err = ConfigError::file_not_found("/etc/guardette/.env");
        assert!(err.to_string().contains("/etc/guardette/.env"));
        assert_eq!(err.key(), None);
    }
}
