//! Error types and result aliases for Pea operations.
//!
//! Provides a unified error type that covers configuration, URL handling and
//! registry traffic, with actionable error messages.

use thiserror::Error;

/// Unified error type for all Pea operations
#[derive(Error, Debug)]
pub enum PeaError {
    // Config errors
    #[error("Failed to parse {file}: {message} at line {line}, column {column}")]
    TomlParse {
        file: String,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // URL errors
    #[error("Invalid URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    // Registry errors
    #[error("Package '{name}' not found in registry")]
    PackageNotFound { name: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Permission denied: {permission} access to {resource}")]
    PermissionDenied {
        permission: String,
        resource: String,
    },

    #[error("Integrity check failed for {package}: expected {expected}, got {actual}")]
    IntegrityFailure {
        package: String,
        expected: String,
        actual: String,
    },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Pea operations
pub type PeaResult<T> = Result<T, PeaError>;

impl PeaError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Create an invalid URL error, keeping the offending input
    pub fn invalid_url(url: &str, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            source,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PeaError::Network { .. } | PeaError::Io { .. })
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            PeaError::PackageNotFound { .. } => {
                Some("Check the package name spelling or the registry configured for its scope")
            },
            PeaError::Network { .. } => Some("Check your internet connection and try again"),
            PeaError::InvalidUrl { .. } => {
                Some("Registry URLs must be absolute, e.g. https://registry.example.com/")
            },
            PeaError::PermissionDenied { .. } => {
                Some("Check the credentials configured for this registry")
            },
            PeaError::TomlParse { .. } | PeaError::ConfigValidation { .. } => {
                Some("Fix the [registry] section of pea.toml or ~/.pea/config.toml")
            },
            _ => None,
        }
    }
}
