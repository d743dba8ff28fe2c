//! Error types for Entitygraph.
//!
//! Library crates use [`EntityGraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::StageName;

/// Top-level error type for all Entitygraph operations.
#[derive(Debug, thiserror::Error)]
pub enum EntityGraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to a collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (entity not publish-ready, bad field, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Malformed pipeline input. The only error that pre-empts a whole run.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A stage exceeded its share of the timeout budget.
    #[error("{stage} timed out after {budget_ms}ms")]
    StageTimeout { stage: StageName, budget_ms: u64 },

    /// A collaborator failed inside a stage.
    #[error("{stage} failed: {message}")]
    StageFailure { stage: StageName, message: String },

    /// The shared daily search quota is spent.
    #[error("daily search quota of {limit} queries exhausted")]
    QuotaExceeded { limit: u32 },

    /// The text-assessment collaborator returned output we could not parse.
    #[error("assessment parse error: {0}")]
    AssessmentParse(String),

    /// The text-assessment collaborator call itself failed.
    #[error("assessment error: {0}")]
    Assessment(String),

    /// The publish collaborator failed.
    #[error("publish error: {0}")]
    Publish(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EntityGraphError>;

impl EntityGraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an invalid-input error from any displayable message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
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
