//! Persistence for forecast stations and observation rows.
//!
//! Provides:
//! - The [`Datastore`] contract used by ingestion and queries
//! - Typed rows for each domain ([`WindObservation`], [`WaveObservation`])
//! - [`PgStore`]: PostgreSQL/PostGIS via sqlx, bulk loads through `COPY`
//! - [`MemoryStore`]: an in-process store with the same semantics

pub mod datastore;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;

pub use datastore::{
    observation_indexes, station_location_index, Datastore, IndexMethod, IndexSpec,
};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{
    observation_columns, value_columns, NewStation, Observation, Station, WaveObservation,
    WindObservation,
};
pub use postgres::PgStore;
