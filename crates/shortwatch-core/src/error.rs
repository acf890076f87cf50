//! Core error types for shortwatch.
//!
//! Domain types and configuration fail with these; each other crate keeps
//! its own error enum.

use thiserror::Error;

/// Central error type for shortwatch operations.
#[derive(Error, Debug)]
pub enum ShortwatchError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A value failed a domain check, such as a malformed jurisdiction code
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `ShortwatchError`.
pub type Result<T> = std::result::Result<T, ShortwatchError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShortwatchError::Validation("invalid jurisdiction".to_string());
        assert_eq!(err.to_string(), "validation error: invalid jurisdiction");

        let err = ConfigError::InvalidValue {
            field: "ingestion.lookback_days".to_string(),
            reason: "must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for ingestion.lookback_days: must be positive"
        );
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::NoConfigDir;
        let err: ShortwatchError = config_err.into();
        assert!(matches!(err, ShortwatchError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: ShortwatchError = io_err.into();
        assert!(matches!(err, ShortwatchError::Io(_)));
    }
}
