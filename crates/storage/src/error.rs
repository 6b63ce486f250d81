//! Error types for datastore operations.

use thiserror::Error;

/// Result type for datastore operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not reach the database
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A statement failed inside the database
    #[error("Database error: {0}")]
    Database(String),

    /// Table name not known to this store
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Unique or foreign-key constraint violated
    #[error("Constraint violation on {table}: {message}")]
    Constraint { table: String, message: String },

    /// Bulk-copy buffer could not be decoded or encoded
    #[error("Copy buffer error for {table}: {message}")]
    CopyFormat { table: String, message: String },

    /// Identifier rejected before being interpolated into SQL
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl StoreError {
    pub fn constraint(table: &str, message: impl Into<String>) -> Self {
        Self::Constraint {
            table: table.to_string(),
            message: message.into(),
        }
    }

    pub fn copy_format(table: &str, message: impl ToString) -> Self {
        Self::CopyFormat {
            table: table.to_string(),
            message: message.to_string(),
        }
    }
}
