//! Common error types for SMS

use thiserror::Error;

/// Common result type for SMS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the SMS crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Remote store rejected or failed a request
    #[error("Remote error: {0}")]
    Remote(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
