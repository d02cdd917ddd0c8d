//! Defines the application's primary error type `AppError` and a convenience `Result` alias.
//!
//! Uses the `thiserror` crate for ergonomic error definition and provides `From`
//! implementations to convert common external errors into `AppError` variants.
//! Errors that do not implement `Clone` are wrapped in `Arc` to allow `AppError` to be cloneable.

use crate::db::StoreError;
use std::sync::Arc;
use thiserror::Error;

/// The primary error enumeration for all application-specific errors.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// Wrong number of arguments for a known command. Carries the full usage line.
    #[error("usage: {0}")]
    Usage(String),

    /// The first token did not name a registered command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A handle operation was requested before a successful `init`.
    #[error("database not initialized. Please run 'init' first")]
    NotInitialized,

    /// The session has been shut down and accepts no further handle operations.
    #[error("session closed")]
    SessionClosed,

    /// A key that must match existing key material could only have been generated at random.
    #[error("no usable {0} key: expected a passphrase of 1 to 31 characters, a 64-digit hex key, or \"\"")]
    UnusableKey(&'static str),

    /// Error returned by the database collaborator, surfaced verbatim.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// The session logger could not build its sinks.
    #[error("Logger Error: {0}")]
    Logger(String),

    /// Invalid start-up configuration (environment or flags).
    #[error("Config Error: {0}")]
    Config(String),

    /// Error related to standard I/O operations.
    #[error("I/O Error: {0}")]
    Io(Arc<std::io::Error>),

    /// Error originating from the line editor (`rustyline`).
    #[error("Prompt Error: {0}")]
    Prompt(Arc<rustyline::error::ReadlineError>),
}

/// A specialized `Result` type using the application's `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

// --- From implementations ---
// Arc is used for non-Clone error types.

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(Arc::new(err))
    }
}

impl From<rustyline::error::ReadlineError> for AppError {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        AppError::Prompt(Arc::new(err))
    }
}
