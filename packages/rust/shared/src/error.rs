//! Error types for dailydigest.
//!
//! Library crates use [`DigestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! The enum is `Clone` so a single failed fetch can be delivered to every
//! waiter coalesced onto it; error sources are therefore captured as
//! messages, not as live `Error` values.

use std::path::PathBuf;

/// Top-level error type for all dailydigest operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DigestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error (timeout, connection failure, non-2xx response).
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed digest payload.
    #[error("decode error: {0}")]
    Decode(String),

    /// Caller supplied a malformed date key.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Snapshot load/save error. Always non-fatal to the caller.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {message}")]
    Io { path: PathBuf, message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DigestError>;

impl DigestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DigestError::config("missing api base URL");
        assert_eq!(err.to_string(), "config error: missing api base URL");

        let err = DigestError::validation("date should be YYYYMMDD but got x");
        assert!(err.to_string().contains("YYYYMMDD"));
    }

    #[test]
    fn errors_are_cloneable() {
        let err = DigestError::Transport("HTTP 500".into());
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
