//! Error types for stagehand.
//!
//! Errors travel through task graphs as resolved-error tasks, so [`Error`] is
//! a cheap-to-clone value rather than a boxed trait object:
//!
//! - **Cancellation**: an operation resolved because it was asked to stop.
//!   Combinators can tell these apart from ordinary failures with
//!   [`Error::is_cancelled`] and may choose to swallow them.
//! - **Propagated failures**: I/O errors, closed channels, timeouts, panics
//!   caught at a continuation boundary, and user-supplied errors. These are
//!   carried unchanged through every combinator until consumed.
//! - **Configuration**: [`ConfigError`] reports bad environment or file input
//!   when building a runner.
//!
//! Contract violations, such as waiting on an empty task, are not errors.
//! They panic.

use crate::types::CancelLevel;
use core::fmt;
use std::any::Any;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation was cancelled.
    Cancelled,
    /// A deadline passed before the operation completed.
    TimedOut,
    /// An OS-level I/O call failed.
    Io,
    /// The channel was closed.
    ChannelClosed,
    /// A continuation or step function panicked.
    Panicked,
    /// The result of a prepared task was already taken.
    ResultTaken,
    /// An argument was outside its valid range.
    InvalidArgument,
    /// The runner is bound to a different thread.
    WrongThread,
    /// Runtime bug or invalid internal state.
    Internal,
    /// Application-defined failure.
    User,
}

impl ErrorKind {
    /// Returns a short lowercase name for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed out",
            Self::Io => "i/o error",
            Self::ChannelClosed => "channel closed",
            Self::Panicked => "panicked",
            Self::ResultTaken => "result already taken",
            Self::InvalidArgument => "invalid argument",
            Self::WrongThread => "wrong thread",
            Self::Internal => "internal error",
            Self::User => "user error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for stagehand operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    level: Option<CancelLevel>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            level: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a cancellation error recording the level that ended the operation.
    #[must_use]
    pub const fn cancelled(level: CancelLevel) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            message: None,
            level: Some(level),
            source: None,
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub const fn timed_out() -> Self {
        Self::new(ErrorKind::TimedOut)
    }

    /// Wraps an OS I/O error.
    #[must_use]
    pub fn io(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io).with_source(err)
    }

    /// Creates a closed-channel error.
    #[must_use]
    pub const fn channel_closed() -> Self {
        Self::new(ErrorKind::ChannelClosed)
    }

    /// Converts a caught panic payload into an error.
    #[must_use]
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::new(ErrorKind::Panicked).with_message(message)
    }

    /// Creates an error for a second attempt to take a prepared task's result.
    #[must_use]
    pub const fn result_taken() -> Self {
        Self::new(ErrorKind::ResultTaken)
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_message(detail)
    }

    /// Creates a wrong-thread error.
    #[must_use]
    pub fn wrong_thread(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::WrongThread).with_message(detail)
    }

    /// Creates an internal error (runtime bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Wraps an application error.
    #[must_use]
    pub fn user(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(ErrorKind::User).with_source(err)
    }

    /// Creates an application error from a message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(message)
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::TimedOut)
    }

    /// Returns the level at which a cancelled operation gave up.
    #[must_use]
    pub const fn cancel_level(&self) -> Option<CancelLevel> {
        self.level
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the underlying OS error kind for I/O failures.
    #[must_use]
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        self.source
            .as_deref()
            .and_then(|src| src.downcast_ref::<std::io::Error>())
            .map(std::io::Error::kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(level) = self.level {
            write!(f, " at {level}")?;
        }
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        } else if let Some(src) = &self.source {
            write!(f, ": {src}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::io(err)
    }
}

/// A specialized Result type for stagehand operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised while loading runner configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value could not be parsed or was out of range.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        /// The variable or key that carried the value.
        var: String,
        /// The raw value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// A configuration file could not be parsed.
    #[cfg(feature = "config-file")]
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::invalid_argument(err.to_string()).with_source(err)
    }
}
