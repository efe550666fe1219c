//! Error types and Result aliases for treesync.
//!
//! Setup-time problems (bad roots, bad patterns, bad configuration, watch
//! setup) surface as [`Error`]. Per-entry I/O problems during a sync cycle do
//! not: they are collected as [`crate::sync::SyncFailure`] entries so a cycle
//! always runs to completion.

use thiserror::Error;

/// Result type alias using treesync's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for treesync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (unreadable or malformed task file, bad settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input detected before any filesystem mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// An ignore pattern that cannot be compiled.
    #[error("invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// File watcher and watch-session errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to set up OS notifications for a path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// `start()` called on a session that is already running.
    #[error("watch session already active")]
    AlreadyRunning,

    /// `stop()` called on a session that is not running.
    #[error("watch session not running")]
    NotRunning,

    /// Polling thread could not be managed.
    #[error("poller error: {0}")]
    Poller(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid-pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error came from a duplicate start or a stop of an idle session.
    #[must_use]
    pub fn is_concurrency(&self) -> bool {
        matches!(
            self,
            Self::Watcher(WatcherError::AlreadyRunning | WatcherError::NotRunning)
        )
    }
}

impl WatcherError {
    /// Create a watch-failed error.
    pub fn watch_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WatchFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
