//! Common error types for SiteSync

use thiserror::Error;

/// Common result type for SiteSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SiteSync services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistence call did not complete within its deadline
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
