//! Query errors.

use forecast_common::ForecastError;
use storage::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Station not found: {0}")]
    StationNotFound(String),

    #[error("No stations within {0}")]
    NoStationsInBox(String),

    /// Stations exist but hold no rows in the requested window
    #[error("No rows for {stations} between {start} and {end}")]
    NoRowsInRange {
        stations: String,
        start: String,
        end: String,
    },

    #[error("Query exceeds limit: {0}")]
    LimitExceeded(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    /// A lookup that found nothing, as opposed to a bad request or a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            QueryError::StationNotFound(_)
                | QueryError::NoStationsInBox(_)
                | QueryError::NoRowsInRange { .. }
        )
    }

    /// HTTP-style status for callers exposing queries over a web API.
    pub fn status_code(&self) -> u16 {
        match self {
            QueryError::InvalidRequest(_) | QueryError::LimitExceeded(_) => 400,
            QueryError::StationNotFound(_)
            | QueryError::NoStationsInBox(_)
            | QueryError::NoRowsInRange { .. } => 404,
            QueryError::Store(_) => 500,
        }
    }
}

impl From<ForecastError> for QueryError {
    fn from(e: ForecastError) -> Self {
        QueryError::InvalidRequest(e.to_string())
    }
}
