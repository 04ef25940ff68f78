//! Unified error handling for reqhub
//!
//! This module provides a centralized error type system shared by the
//! coordinator, the HTTP wrapper, and configuration loading.
//!
//! Every variant carries an owned message so the type stays `Clone`:
//! a single rejection is fanned out verbatim to every caller attached to
//! the same shared result handle.

use std::fmt;

/// Unified error types for the request coordination system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Configuration-related errors
    Configuration(String),

    /// Transport failures reported by the underlying HTTP client
    Transport(String),

    /// Response payload decoding failures
    Decode(String),

    /// The request was cancelled before it settled
    Cancelled(String),

    /// The executor task died before producing an outcome
    Executor(String),

    /// Validation errors
    Validation(String),

    /// Internal system errors
    Internal(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            FetchError::Transport(msg) => write!(f, "Transport error: {msg}"),
            FetchError::Decode(msg) => write!(f, "Decode error: {msg}"),
            FetchError::Cancelled(msg) => write!(f, "Request cancelled: {msg}"),
            FetchError::Executor(msg) => write!(f, "Executor error: {msg}"),
            FetchError::Validation(msg) => write!(f, "Validation error: {msg}"),
            FetchError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

/// Result type alias for coordination operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> FetchResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> FetchResult<T> {
        self.map_err(|e| FetchError::Internal(format!("{context}: {e}")))
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::core::error::FetchError::Configuration(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::core::error::FetchError::Internal(format!($($arg)*))
    };
}
