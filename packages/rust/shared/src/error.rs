//! Error types for the outreach pipeline.
//!
//! Library crates use [`OutreachError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all outreach operations.
#[derive(Debug, thiserror::Error)]
pub enum OutreachError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an external service.
    #[error("network error: {0}")]
    Network(String),

    /// An external capability is temporarily unavailable.
    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    /// HTML, document or text parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The profile document has an extension no extractor understands.
    #[error("unsupported format: {extension}")]
    UnsupportedFormat { extension: String },

    /// An adapter or model returned a structure that does not match its contract.
    #[error("malformed output: {message}")]
    MalformedOutput { message: String },

    /// Language model call failed.
    #[error("llm error: {message}")]
    Llm { message: String, retryable: bool },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, missing required field, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OutreachError>;

impl OutreachError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an unavailable error from any displayable message.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a malformed-output error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedOutput {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an LLM error. `retryable` marks rate limits and 5xx responses.
    pub fn llm(msg: impl Into<String>, retryable: bool) -> Self {
        Self::Llm {
            message: msg.into(),
            retryable,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry has a chance of succeeding.
    ///
    /// Network failures, unavailable services and retryable model errors are
    /// transient; everything else is a property of the input and will fail
    /// the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Unavailable { .. } => true,
            Self::Llm { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
