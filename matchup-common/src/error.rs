//! Common error types for matchup

use thiserror::Error;

/// Common result type for matchup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared across the matchup service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found, or not visible to the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// Declared winner is not one of the pairing's two candidates
    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    /// Operation not permitted in the session's current state
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No valid caller identity
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
