//! Error types for dataset reading.

use thiserror::Error;

/// Result type for dataset reader operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Error types for dataset reading.
#[derive(Error, Debug)]
pub enum SourceError {
    /// File I/O error
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Missing required variable, column or attribute
    #[error("Missing required data in {source_name}: {what}")]
    MissingData { source_name: String, what: String },

    /// Invalid data format
    #[error("Invalid data format in {source_name}: {message}")]
    InvalidFormat {
        source_name: String,
        message: String,
    },

    /// CSV decoding error
    #[error("CSV error in {source_name}: {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    /// Source format not compiled into this build
    #[error("Unsupported source: {0}")]
    Unsupported(String),
}

impl SourceError {
    pub fn missing(source_name: impl Into<String>, what: impl Into<String>) -> Self {
        Self::MissingData {
            source_name: source_name.into(),
            what: what.into(),
        }
    }

    pub fn invalid(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
