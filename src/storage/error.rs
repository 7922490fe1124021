//! Storage module error types
//!
//! Provides error types for local store operations.

use thiserror::Error;

/// Storage operation error type
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Referenced row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Lock error when accessing database
    #[error("Database lock poisoned")]
    LockError,

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
