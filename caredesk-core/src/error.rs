/// Structured error types for caredesk-core.
///
/// Uses `thiserror` so library consumers get composable errors; the
/// `caredesk` binary wraps them in `anyhow` with context.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationError;

/// Coarse classification used by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP 429-like throttling
    RateLimit,
    /// Connectivity failure (refused, reset, timed out)
    Network,
    /// Anything else: server errors, rejected payloads, missing records
    Other,
}

/// Failure reported by an entity gateway
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("rate limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("{message}")]
    Other { message: String },
}

impl GatewayError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Network { .. } => ErrorKind::Network,
            Self::NotFound { .. } | Self::Rejected { .. } | Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Only throttling and connectivity failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::RateLimit | ErrorKind::Network)
    }
}

impl GatewayError {
    /// Short message for the list view, by error class.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::RateLimit => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            ErrorKind::Network => {
                "Network error. Check your connection and try again.".to_string()
            }
            ErrorKind::Other => self.to_string(),
        }
    }
}

/// Dialog submission failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    /// Field errors block the request; nothing was sent
    #[error("{} field(s) failed validation", .errors.len())]
    Invalid { errors: BTreeMap<String, String> },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Main error type for caredesk-core operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Import file could not be read
    #[error("Cannot import {path:?}: {reason}")]
    Import { path: PathBuf, reason: String },

    /// Unknown entity key
    #[error("Unknown entity '{key}'")]
    UnknownEntity { key: String },

    /// Field assignment could not be applied to a record
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// Result type alias for caredesk-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub fn import(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Import {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_entity(key: impl Into<String>) -> Self {
        Self::UnknownEntity { key: key.into() }
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GatewayError::not_found("city", "c1");
        assert_eq!(err.to_string(), "city 'c1' not found");

        let err = CoreError::unknown_entity("planet");
        assert_eq!(err.to_string(), "Unknown entity 'planet'");
    }

    #[test]
    fn test_retry_classification() {
        assert!(GatewayError::rate_limited("slow down").is_retryable());
        assert!(GatewayError::network("connection refused").is_retryable());
        assert!(!GatewayError::other("boom").is_retryable());
        assert!(!GatewayError::not_found("city", "x").is_retryable());
        assert_eq!(
            GatewayError::Rejected {
                status: 500,
                message: "oops".into()
            }
            .kind(),
            ErrorKind::Other
        );
    }

    #[test]
    fn test_submit_error_display() {
        let mut errors = BTreeMap::new();
        errors.insert("code".to_string(), "code is required".to_string());
        let err = SubmitError::Invalid { errors };
        assert_eq!(err.to_string(), "1 field(s) failed validation");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: CoreError = io_err.into();

        assert!(matches!(err, CoreError::Io { .. }));
    }
}
