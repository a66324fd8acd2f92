//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the application.
//! Library modules use specific error types via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - All errors implement `std::error::Error` for compatibility
//!
//! # Example
//!
//! ```ignore
//! use jukebox::error::{Error, Result};
//!
//! fn resolve(path: &Path) -> Result<()> {
//!     let settings = crate::config::load(); // never fails, falls back to defaults
//!     let _ = std::fs::metadata(path)?;      // IO errors auto-convert
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// User-input errors are reported inline and abort only the request that
/// produced them; transient/download/player errors carry enough context
/// for the queue engine to report a terminal status; worker/supervisor
/// errors are fatal to their process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (IPC wire format / config) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A user-supplied request could not be parsed; reported inline, aborts
    /// only that one request.
    #[error("{0}")]
    UserInput(String),

    /// A transient transport/API failure that exhausted its retry budget.
    #[error("transient failure after retries: {0}")]
    Transient(String),

    /// Source download failed (404, codec failure, etc).
    #[error("download failed: {0}")]
    Download(String),

    /// Audio playback error surfaced by the player backend.
    #[error("playback error: {0}")]
    Playback(String),

    /// The worker's top-level scheduler caught an unrecoverable exception.
    #[error("worker error: {0}")]
    Worker(String),

    /// The supervisor could not reach or control the worker process.
    #[error("supervisor error: {0}")]
    Supervisor(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a user-input error.
    pub fn user_input(message: impl Into<String>) -> Self {
        Self::UserInput(message.into())
    }

    /// Create a download error.
    pub fn download(message: impl Into<String>) -> Self {
        Self::Download(message.into())
    }

    /// Create a playback error.
    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::download("404 not found");
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::playback("buffer underrun").context("while playing track");
        let msg = err.to_string();
        assert!(msg.contains("while playing track"));
    }

    #[test]
    fn test_user_input_error() {
        let err = Error::user_input("Couldn't parse float: \"abc\"");
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::playback("test"));
        let with_ctx = result.with_context("additional context");
        assert!(with_ctx.unwrap_err().to_string().contains("additional context"));
    }
}
