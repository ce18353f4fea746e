//! Unified error types for snowgate with fail-open philosophy.
//!
//! A report processor must never break the run it reports on. Configuration
//! errors are raised before any network call so no partial notification is
//! sent, and the processor entry point logs every error instead of
//! propagating it to the caller.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for snowgate operations.
#[derive(Error, Debug)]
pub enum SnowgateError {
    /// Malformed operator configuration (trigger lists, glob patterns, settings).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// I/O errors reading settings or report files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Network-level failure talking to ServiceNow or the console.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// ServiceNow answered with a non-success status.
    #[error("{message}. Error from {endpoint} (status: {status}): {body}")]
    Api {
        message: String,
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Secret resolution failed.
    #[error("secret error: {message}")]
    Secret { message: String },
}

/// A specialized Result type for snowgate operations.
pub type Result<T> = std::result::Result<T, SnowgateError>;

impl SnowgateError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an API error for a non-success response.
    pub fn api(
        message: impl Into<String>,
        endpoint: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::Api {
            message: message.into(),
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    /// Create a secret resolution error.
    pub fn secret(message: impl Into<String>) -> Self {
        Self::Secret {
            message: message.into(),
        }
    }

    /// Whether this error comes from operator configuration.
    ///
    /// Configuration errors are never retried and are surfaced verbatim.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

impl From<io::Error> for SnowgateError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for SnowgateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Log the error and return a safe default instead of propagating it.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the snowgate CLI.
pub mod exit_codes {
    /// The command completed (a notification may or may not have been sent).
    pub const OK: i32 = 0;

    /// The command failed (configuration, transport or API error).
    pub const ERROR: i32 = 1;

    /// The process panicked.
    pub const CRASH: i32 = 3;
}
