//! Error types for Presto operations.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Presto.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource does not exist (HTTP 404). Never retried.
    #[error("'{url}' not found (HTTP 404)")]
    NotFound {
        /// Requested URL.
        url: String,
    },

    /// Transport-level failure: timeouts, resets, non-404 HTTP errors.
    #[error("transport error for {url}: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// HTTP status code, when one was received.
        status: Option<u16>,
        /// Raw error text.
        message: String,
    },

    /// Malformed JSON body. Never retried.
    #[error("invalid json from {url}: {message}")]
    Parse {
        /// Source of the body.
        url: String,
        /// Parser error text.
        message: String,
    },

    /// IO error.
    #[error("io error at {path}: {message}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Cache error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Create an IO error with context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Create a transport error without a status code.
    #[must_use]
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Create a transport error carrying an HTTP status code.
    #[must_use]
    pub fn transport_with_status(
        url: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            url: url.into(),
            status: Some(status),
            message: message.into(),
        }
    }

    /// True for HTTP 404 errors, which abort retry loops immediately.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for failures that may succeed on a later attempt.
    ///
    /// Not-found and parse errors are deterministic and excluded.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Io { .. })
    }

    /// HTTP status code attached to this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result type for Presto operations.
pub type Result<T> = std::result::Result<T, Error>;
