//! Error types for the indexing module.

use thiserror::Error;

/// Errors that can occur during indexing operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The connection string names a database protocol we do not support.
    #[error("unsupported database protocol: {0}")]
    UnsupportedProtocol(String),

    /// The connection string could not be parsed at all.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for indexing operations.
pub type Result<T> = std::result::Result<T, IndexError>;
