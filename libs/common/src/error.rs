//! Custom error types for the common library
//!
//! `DatabaseError` covers pool bootstrap. `StoreError` is what every
//! persistence call made on behalf of a request returns; it carries a
//! structured [`FailureKind`] so callers can decide whether to retry
//! without matching on message text.

use std::io::ErrorKind;

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// How a failed store call should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend did not answer in time.
    Timeout,
    /// The connection went away mid-call.
    ConnectionReset,
    /// Anything else; retrying will not help.
    Permanent,
}

impl FailureKind {
    /// Whether the failure is worth another attempt.
    pub fn is_transient(self) -> bool {
        matches!(self, FailureKind::Timeout | FailureKind::ConnectionReset)
    }

    /// Machine-readable code surfaced to HTTP clients.
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::Timeout => "store_timeout",
            FailureKind::ConnectionReset => "store_connection_reset",
            FailureKind::Permanent => "store_failure",
        }
    }
}

/// Error returned by session, account and gallery stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store operation timed out: {0}")]
    Timeout(String),

    #[error("store connection reset: {0}")]
    ConnectionReset(String),

    #[error("store operation failed: {0}")]
    Backend(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflicting record: {0}")]
    Conflict(String),

    /// A record was found but could not be decoded.
    #[error("stored record is malformed: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StoreError::Timeout(_) => FailureKind::Timeout,
            StoreError::ConnectionReset(_) => FailureKind::ConnectionReset,
            StoreError::Backend(_) | StoreError::Conflict(_) | StoreError::Corrupt(_) => {
                FailureKind::Permanent
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

impl From<SqlxError> for StoreError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::PoolTimedOut => StoreError::Timeout(err.to_string()),
            SqlxError::Io(io) => match io.kind() {
                ErrorKind::TimedOut => StoreError::Timeout(err.to_string()),
                ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof => StoreError::ConnectionReset(err.to_string()),
                _ => StoreError::Backend(err.to_string()),
            },
            SqlxError::Database(db) => match db.code().as_deref() {
                // query_canceled, raised by statement_timeout
                Some("57014") => StoreError::Timeout(err.to_string()),
                // unique_violation
                Some("23505") => StoreError::Conflict(err.to_string()),
                Some(code) if code.starts_with("08") => {
                    StoreError::ConnectionReset(err.to_string())
                }
                _ => StoreError::Backend(err.to_string()),
            },
            SqlxError::ColumnDecode { .. } | SqlxError::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else if err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::ConnectionReset(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
