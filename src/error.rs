//! Crate-wide error types.
//!
//! Every fallible operation in the library returns [`Result`]. The variants
//! follow the four kinds callers need to tell apart:
//!
//! - [`Error::Argument`]: a required parameter was empty or unusable
//! - [`Error::Validation`]: data conflicts with itself (e.g. hash vs level id)
//! - [`Error::InvalidState`]: the manager or playlist cannot do this right now
//! - [`Error::Serialization`]: anything that went wrong inside a format handler
//!
//! Format handlers only ever surface [`Error::Serialization`]; the underlying
//! `serde_json`, `zip`, `base64` or I/O error is kept as the source.
//!
//! # Example
//!
//! ```ignore
//! use playlist_keeper::error::{Error, Result};
//!
//! fn check_title(title: &str) -> Result<()> {
//!     if title.is_empty() {
//!         return Err(Error::argument("title must not be empty"));
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error kept as the cause of a serialization failure.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level library error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Null/empty required parameter, or an explicitly passed value the
    /// callee cannot work with.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Conflicting or ill-typed data.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Operation not possible in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Failure while reading or writing a playlist wire format.
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// File I/O error outside of a handler (renames, directory scans)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
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
    /// Create an argument error.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Create a serialization error without an underlying cause.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying failure as a serialization error.
    pub fn serialization_from(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
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

    /// True for [`Error::Serialization`], looking through added context.
    pub fn is_serialization(&self) -> bool {
        match self {
            Self::Serialization { .. } => true,
            Self::WithContext { source, .. } => source.is_serialization(),
            _ => false,
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
        let err = Error::not_found("/playlists/missing.bplist");
        assert!(err.to_string().contains("/playlists/missing.bplist"));
    }

    #[test]
    fn test_serialization_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err = Error::serialization_from("failed to read manifest", io);
        assert!(err.is_serialization());
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("failed to read manifest"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::invalid_state("no handler for extension 'xyz'").context("while loading");
        let msg = err.to_string();
        assert!(msg.contains("while loading"));
        assert!(!err.is_serialization());
    }

    #[test]
    fn test_context_preserves_kind() {
        let err = Error::serialization("bad json").context("reading foo.bplist");
        assert!(err.is_serialization());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::validation("levelId and hash do not match"));
        let with_ctx = result.with_context("constructing song");
        assert!(
            with_ctx
                .unwrap_err()
                .to_string()
                .contains("constructing song")
        );
    }
}
