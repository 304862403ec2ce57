//! Error types for shellpane.

use thiserror::Error;

/// Main error type for shellpane operations.
///
/// Only lifecycle failures surface as errors. Malformed program output is
/// absorbed by the decoder and never reaches this type.
#[derive(Debug, Error)]
pub enum Error {
    /// The pty pair or child process could not be created
    #[error("Failed to start shell process: {0}")]
    ForkFailed(String),

    /// The configured or inherited shell could not be resolved to an executable
    #[error("Shell not found: {0}")]
    ShellNotFound(String),

    /// Invalid terminal dimensions
    #[error("Invalid dimensions: {cols}x{rows}")]
    InvalidDimensions {
        /// Number of columns
        cols: u16,
        /// Number of rows
        rows: u16,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether a consumer should surface this inline and let the user re-spawn.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ForkFailed(_) | Self::ShellNotFound(_) | Self::Io(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fork_failed_error() {
        let err = Error::ForkFailed("openpty: out of ptys".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to start shell process: openpty: out of ptys"
        );
    }

    #[test]
    fn test_shell_not_found_error() {
        let err = Error::ShellNotFound("/no/such/shell".to_string());
        assert_eq!(err.to_string(), "Shell not found: /no/such/shell");
    }

    #[test]
    fn test_invalid_dimensions_error() {
        let err = Error::InvalidDimensions { cols: 0, rows: 24 };
        assert_eq!(err.to_string(), "Invalid dimensions: 0x24");
    }

    #[test]
    fn test_config_error() {
        let err = Error::Config("default_cols must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: default_cols must be > 0"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_retryable() {
        assert!(Error::ForkFailed("x".into()).is_retryable());
        assert!(Error::ShellNotFound("x".into()).is_retryable());
        assert!(!Error::Config("x".into()).is_retryable());
        assert!(!Error::InvalidDimensions { cols: 0, rows: 0 }.is_retryable());
    }
}
