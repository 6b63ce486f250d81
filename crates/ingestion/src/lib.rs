//! Forecast ETL library.
//!
//! Turns wind and wave model output into per-station time series rows in a
//! spatial database.
//!
//! # Architecture
//!
//! A cycle runs these stages in order:
//!
//! - Normalize coordinates and squeeze degenerate axes ([`normalize`])
//! - Resolve every grid cell to a stable station id ([`StationResolver`])
//! - Compute derived wind and wave quantities ([`derived`])
//! - Flatten arrays into one row per station and timestamp ([`flatten`])
//! - Select the archive window ([`select_archive`])
//! - Replace the forecast and archive tables in chunks ([`BulkLoader`])
//!
//! [`EtlPipeline`] wires the stages together and is what the `ingester`
//! service drives.

pub mod archive;
pub mod config;
pub mod derived;
pub mod error;
pub mod flatten;
pub mod loader;
pub mod normalize;
mod pipeline;
pub mod stations;

// Re-exports
pub use archive::{archive_cutoff, select_archive};
pub use config::{ArchiveBound, ArchiveWindows, EtlConfig, WindVariables};
pub use derived::{derive_wind, max_wave_height, DerivedWind};
pub use error::{IngestionError, Result};
pub use flatten::{cell_keys, cell_station_ids, flatten_wave, flatten_wind};
pub use loader::{serialize_chunk, BulkLoader, LoadOptions, LoadReport};
pub use normalize::{merge_along_time, normalize, GridLayout, NormalizedGrid};
pub use pipeline::{purge, CycleReport, EtlPipeline, PurgeTarget};
pub use stations::{StationAssignment, StationResolver};
