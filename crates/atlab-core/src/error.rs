//! Error types for atlab.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Variants fall into four families, see
//! [`ErrorKind`]:
//!
//! - **connection** -- open/write/read failures on the serial stream,
//!   timeouts, and the stream closing underneath a read;
//! - **protocol** -- the module answered with `ERROR`, `ABORT`, or the
//!   stream ended before any terminal line;
//! - **parse** -- an otherwise successful transaction lacked an expected
//!   tag or carried a malformed field;
//! - **configuration** -- the active device spec has no template for an
//!   intent, a template is malformed, or a spec file is invalid.
//!
//! Connection and protocol errors may be retried by the caller.
//! Configuration errors indicate a setup mistake and should abort the run.

/// The error type for all atlab operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open or configuration failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// Timed out waiting for bytes from the module.
    ///
    /// This is a connection-level failure, never a protocol outcome.
    #[error("timeout waiting for response")]
    Timeout,

    /// No connection to the module has been established, or it was closed.
    #[error("not connected")]
    NotConnected,

    /// The connection to the module was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// The byte stream ended while waiting for a notification.
    #[error("connection closed")]
    ConnectionClosed,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The module terminated the transaction with a line containing `ERROR`.
    ///
    /// Carries the exact terminal line, e.g. `+CME ERROR: 3`.
    #[error("ERROR: '{0}'")]
    CommandFailed(String),

    /// The module terminated the transaction with `ABORT`.
    #[error("ABORT: '{0}'")]
    Aborted(String),

    /// The stream ended before `OK`, `ERROR`, or `ABORT` was seen.
    ///
    /// Carries every line collected before the stream ended.
    #[error("invalid response: {0:?}")]
    IncompleteResponse(Vec<String>),

    /// An expected notification tag was absent from a successful transaction.
    #[error("{0} response not found")]
    TagNotFound(String),

    /// A field in a successful transaction was missing or malformed.
    #[error("malformed response: {0}")]
    Parse(String),

    /// The active device spec does not support the requested intent.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A template or spec file is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An invalid parameter was passed to an intent.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Coarse classification of an [`Error`], used for retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Protocol,
    Parse,
    Configuration,
}

impl Error {
    /// Return the family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_)
            | Error::Timeout
            | Error::NotConnected
            | Error::ConnectionLost
            | Error::ConnectionClosed
            | Error::Io(_) => ErrorKind::Connection,
            Error::CommandFailed(_) | Error::Aborted(_) | Error::IncompleteResponse(_) => {
                ErrorKind::Protocol
            }
            Error::TagNotFound(_) | Error::Parse(_) => ErrorKind::Parse,
            Error::Unsupported(_) | Error::Configuration(_) | Error::InvalidParameter(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// Whether this error is a configuration mistake that must not be retried.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
