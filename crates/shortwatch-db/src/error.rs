//! Database error types.

use thiserror::Error;

/// Errors raised by the position store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or create the database file.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// A verdict update targeted a position row that does not exist.
    #[error("position {0} not found")]
    PositionNotFound(String),

    /// A stored column could not be read back into its domain type.
    #[error("column {column} holds an unreadable value: {detail}")]
    Decode {
        /// Column name
        column: &'static str,
        /// Parser message
        detail: String,
    },

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Filesystem error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatabaseError {
    pub(crate) fn decode(column: &'static str, detail: impl std::fmt::Display) -> Self {
        Self::Decode {
            column,
            detail: detail.to_string(),
        }
    }
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
