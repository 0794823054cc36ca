//! Error types for the GraphRAG client.
//!
//! Library crates use [`GraphRagError`] and [`StageError`] via `thiserror`.
//! App crates (cli/tui) wrap these with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for configuration, I/O and setup failures.
#[derive(Debug, thiserror::Error)]
pub enum GraphRagError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// HTTP client construction or endpoint resolution error.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (blank query, empty stage list, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A pipeline stage failed.
    #[error(transparent)]
    Stage(#[from] StageError),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GraphRagError>;

impl GraphRagError {
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
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage failures
// ---------------------------------------------------------------------------

/// Failure of a single stage call. Any of these aborts the whole run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// No response within the stage timeout.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// No HTTP response at all (connection refused, reset, DNS, ...).
    #[error("could not reach {endpoint}: {detail}")]
    Network { endpoint: String, detail: String },

    /// The server answered with an error status or an error body.
    #[error("server error (HTTP {status}): {detail}")]
    ServerError { status: u16, detail: String },

    /// 2xx response that is not JSON or lacks a field the stage requires.
    #[error("malformed response: missing `{missing_field}`")]
    MalformedResponse { missing_field: String },
}

/// Discriminant of a [`StageError`], for conditional UI treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Network,
    ServerError,
    MalformedResponse,
}

impl StageError {
    /// Shorthand for a [`StageError::MalformedResponse`].
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MalformedResponse {
            missing_field: field.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Network { .. } => FailureKind::Network,
            Self::ServerError { .. } => FailureKind::ServerError,
            Self::MalformedResponse { .. } => FailureKind::MalformedResponse,
        }
    }

    /// The single human-readable message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout { .. } => "request timed out, try again later".to_string(),
            Self::Network { .. } => "could not reach the server".to_string(),
            Self::ServerError { detail, .. } => detail.clone(),
            Self::MalformedResponse { .. } => {
                "server did not return the expected report content".to_string()
            }
        }
    }
}
