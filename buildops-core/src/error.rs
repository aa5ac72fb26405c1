/// Structured error types for buildops-core.
///
/// Library crates get typed errors; the `buildops` binary wraps them in
/// `anyhow` with context.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Config file could not be parsed
    #[error("Invalid config file {path:?}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Configuration value rejected
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for buildops-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a TOML parse error tied to a file path
    pub fn toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::Toml {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = CoreError::config("API_PORT must be a number");
        assert_eq!(
            err.to_string(),
            "Configuration error: API_PORT must be a number"
        );
    }

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
