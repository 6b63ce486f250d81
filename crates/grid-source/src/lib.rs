//! Dataset readers for forecast model output.
//!
//! Two source shapes are supported:
//!
//! - **Gridded**: a multi-dimensional file exposing latitude/longitude
//!   coordinate arrays (1-D axes or 2-D meshes, optionally with a leading
//!   degenerate time axis), a time axis and `(time, y, x)` or
//!   `(time, station)` field arrays. Read natively from NetCDF when the
//!   `netcdf` feature is enabled.
//! - **Scattered**: flat point records keyed by `(time, lat, lon)`, built by
//!   joining two row-aligned CSV tables (the wave model's `tab01`/`tab41`).
//!
//! Readers only decode; squeezing, collapsing and station resolution happen
//! downstream in the ingestion crate.

pub mod dataset;
pub mod error;
#[cfg(feature = "netcdf")]
pub mod native;
pub mod tabular;
pub mod time_units;

pub use dataset::{GriddedDataset, GriddedVariables, PointRecord, ScatteredDataset};
pub use error::{SourceError, SourceResult};
#[cfg(feature = "netcdf")]
pub use native::read_gridded;
pub use tabular::{read_wave_tables, read_wave_tables_from_readers, TabularOptions};
pub use time_units::TimeUnits;

/// Read a gridded dataset, failing when NetCDF support is not compiled in.
#[cfg(not(feature = "netcdf"))]
pub fn read_gridded(
    path: &std::path::Path,
    _variables: &GriddedVariables,
) -> SourceResult<GriddedDataset> {
    Err(SourceError::Unsupported(format!(
        "{}: built without the `netcdf` feature",
        path.display()
    )))
}
