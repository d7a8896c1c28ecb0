//! Error types for orawatch.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Classification of Oracle driver failures by ORA code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// ORA-01017: invalid username/password.
    AuthFailure,
    /// ORA-12154: could not resolve the connect identifier.
    NameResolution,
    /// ORA-12514: listener does not know of the requested service.
    ServiceNotFound,
    /// ORA-12541: no listener at the target host/port.
    ListenerUnreachable,
    /// Any other driver-reported error; carries the raw code and message.
    Other,
}

/// Main error type for orawatch operations.
#[derive(Error, Debug)]
pub enum OrawatchError {
    /// A saved-connection id or TNS alias could not be found.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// A resolved connection is missing its user id or password.
    #[error("Connection incomplete: {0}")]
    ConnectionIncomplete(String),

    /// An Oracle driver error, classified by ORA code.
    #[error("Driver error (ORA-{code:05}): {message}")]
    Driver {
        kind: DriverErrorKind,
        code: i32,
        message: String,
    },

    /// Execution exceeded its deadline or was cancelled.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Local state-store errors (SQLite open, CRUD, migrations).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration errors (invalid config file, bad DSN, missing fields).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other failure, wrapped with context.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl OrawatchError {
    /// Creates a connection-not-found error with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::ConnectionNotFound(msg.into())
    }

    /// Creates a connection-incomplete error with the given message.
    pub fn incomplete(msg: impl Into<String>) -> Self {
        Self::ConnectionIncomplete(msg.into())
    }

    /// Creates a timeout error with the given message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an unexpected error with the given message.
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConnectionNotFound(_) => "Connection Not Found",
            Self::ConnectionIncomplete(_) => "Connection Incomplete",
            Self::Driver { .. } => "Driver Error",
            Self::Timeout(_) => "Timeout",
            Self::Persistence(_) => "Persistence Error",
            Self::Config(_) => "Configuration Error",
            Self::Unexpected(_) => "Unexpected Error",
        }
    }

    /// Returns true if this error came from the Oracle driver.
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver { .. })
    }
}

/// Result type alias using OrawatchError.
pub type Result<T> = std::result::Result<T, OrawatchError>;
