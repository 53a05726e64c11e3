//! Error types for capwatch

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using capwatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for capwatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// History file exists but could not be read or parsed
    #[error("Invalid history file {path}: {reason}")]
    History {
        /// History file location
        path: PathBuf,
        /// Underlying read or parse failure
        reason: String,
    },

    /// A usage percentage was requested against a zero limit or total
    #[error("Cannot compute usage of {target}: limit is zero")]
    ZeroCapacity {
        /// Quota path or cluster name
        target: String,
    },

    /// Metric source error
    #[error("Metric source error: {0}")]
    Source(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Notification dispatch error
    #[error("Notification error: {0}")]
    Notify(#[from] crate::alerting::NotificationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a metric source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a zero capacity error for the given target
    pub fn zero_capacity(target: impl Into<String>) -> Self {
        Self::ZeroCapacity {
            target: target.into(),
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Validation(_) | Self::History { .. } | Self::Io(_)
        )
    }
}
