//! Error types for the ingestion crate.

use grid_source::SourceError;
use storage::StoreError;
use thiserror::Error;

/// Errors that fail an ETL cycle.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// Coordinate, time or field arrays missing or inconsistent
    #[error("Malformed input in {source_name}: {message}")]
    InputMalformed {
        source_name: String,
        message: String,
    },

    /// Grid cells without a persisted station after resolution
    #[error(
        "Station mismatch in {source_name}: {unresolved} of {cells} grid cells have no station \
         (first at {example})"
    )]
    StationMismatch {
        source_name: String,
        unresolved: usize,
        cells: usize,
        example: String,
    },

    /// Flattened rows do not equal stations x timestamps
    #[error(
        "Row count mismatch for {table}: expected {expected} ({stations} stations x {times} times), got {actual}"
    )]
    RowCountMismatch {
        table: String,
        expected: usize,
        actual: usize,
        stations: usize,
        times: usize,
    },

    /// A chunk failed to load; the table is truncated and partially filled
    #[error("Bulk load into {table} failed at chunk {chunk} (rows from {offset}): {source}")]
    BulkLoad {
        table: String,
        chunk: usize,
        offset: usize,
        #[source]
        source: StoreError,
    },

    /// Row counts after loading differ from what was sent
    #[error("Load verification failed for {table}: sent {sent} rows, table holds {stored}")]
    LoadVerification {
        table: String,
        sent: usize,
        stored: u64,
    },

    #[error("Failed to serialize rows for {table}: {message}")]
    Serialize { table: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestionError {
    pub fn malformed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InputMalformed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
