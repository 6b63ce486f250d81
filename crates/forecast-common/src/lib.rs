//! Common types and utilities shared across the forecast ETL crates.

pub mod bbox;
pub mod domain;
pub mod error;
pub mod geo;
pub mod time;

pub use bbox::BoundingBox;
pub use domain::{Domain, TableKind, TableSet};
pub use error::{ForecastError, ForecastResult};
pub use geo::{CoordKey, GeoPoint, DEFAULT_COORDINATE_PRECISION, SRID_WGS84};
pub use time::{parse_timestamp, TimeRange, COPY_TIMESTAMP_FORMAT};
