//! Error types for FAQBot.
//!
//! Library crates use [`FaqBotError`] via `thiserror`.
//! The CLI wraps this with `color-eyre`; the server maps it onto HTTP statuses.

use std::path::PathBuf;

/// Top-level error type for all FAQBot operations.
#[derive(Debug, thiserror::Error)]
pub enum FaqBotError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching sitemaps or pages.
    #[error("network error: {0}")]
    Network(String),

    /// Sitemap, HTML or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Embedding or completion API error.
    #[error("language model error: {0}")]
    Llm(String),

    /// Payment provider error.
    #[error("billing error: {0}")]
    Billing(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Caller-facing validation error (missing field, empty sitemap, ...).
    #[error("{message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FaqBotError>;

impl FaqBotError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was caused by bad caller input rather than a fault.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
