//! Error types for the pattern learning engine
//!
//! Library operations return [`LearningError`]; the binary and config layer
//! use `anyhow` and attach context at the boundary.

use thiserror::Error;

/// Errors raised by the learning engine
#[derive(Debug, Error)]
pub enum LearningError {
    /// The backing SQLite store failed (connection, constraint, I/O)
    #[error("learning storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Observation context could not be encoded or decoded
    #[error("learning serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A user-defined category collided with an existing name
    #[error("category already exists: {0}")]
    CategoryExists(String),

    /// A category referenced by id does not belong to this user
    #[error("category not found: {0}")]
    CategoryNotFound(String),

    /// A configured threshold is out of range
    #[error("invalid learning configuration: {0}")]
    Config(String),

    /// I/O failure preparing the database location
    #[error("learning I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for learning operations
pub type Result<T> = std::result::Result<T, LearningError>;
