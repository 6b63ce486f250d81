//! The datastore contract consumed by ingestion and queries.

use async_trait::async_trait;
use forecast_common::{BoundingBox, GeoPoint, TableKind, TableSet, TimeRange};

use crate::error::StoreResult;
use crate::models::{NewStation, Observation, Station};

/// Index access method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMethod {
    BTree,
    Gist,
}

impl IndexMethod {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IndexMethod::BTree => "btree",
            IndexMethod::Gist => "gist",
        }
    }
}

/// A secondary index that must exist after a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub method: IndexMethod,
}

impl IndexSpec {
    pub fn btree(name: String, table: &str, columns: &[&str]) -> Self {
        Self {
            name,
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            method: IndexMethod::BTree,
        }
    }
}

/// Indexes of an observation table. The first one is the cluster index.
pub fn observation_indexes(tables: &TableSet, kind: TableKind) -> Vec<IndexSpec> {
    let table = tables.observations(kind);
    vec![
        IndexSpec::btree(
            tables.observation_index(kind, "time_station"),
            table,
            &["forecast_time", "station_id"],
        ),
        IndexSpec::btree(tables.observation_index(kind, "time"), table, &["forecast_time"]),
        IndexSpec::btree(tables.observation_index(kind, "station"), table, &["station_id"]),
    ]
}

/// Spatial index on a station table.
pub fn station_location_index(tables: &TableSet) -> IndexSpec {
    IndexSpec {
        name: tables.location_index(),
        table: tables.stations.clone(),
        columns: vec!["location".to_string()],
        method: IndexMethod::Gist,
    }
}

/// Persistence for stations and observation rows.
///
/// Table arguments are names from a [`TableSet`]. Station lookups return
/// `None`/empty for misses; deciding whether a miss is an error is up to the
/// caller.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Create tables and base indexes for every domain if absent.
    async fn migrate(&self) -> StoreResult<()>;

    /// All stations ordered by id.
    async fn load_stations(&self, table: &str) -> StoreResult<Vec<Station>>;

    /// Insert stations as one atomic unit, ignoring id or location conflicts.
    /// Returns the number actually inserted.
    async fn insert_stations(&self, table: &str, stations: &[NewStation]) -> StoreResult<u64>;

    /// Empty a table, restarting identities and cascading to dependents.
    async fn truncate(&self, table: &str) -> StoreResult<()>;

    /// Load a CSV buffer (with header) into `columns` of `table`.
    async fn bulk_copy(&self, table: &str, columns: &[&str], buffer: Vec<u8>) -> StoreResult<u64>;

    async fn ensure_index(&self, index: &IndexSpec) -> StoreResult<()>;

    /// Physically reorder `table` by `index`.
    async fn cluster(&self, table: &str, index: &str) -> StoreResult<()>;

    async fn station_by_name(&self, table: &str, name: &str) -> StoreResult<Option<Station>>;

    /// Closest station by geographic distance; ties go to the lowest id.
    async fn nearest_station(&self, table: &str, point: GeoPoint) -> StoreResult<Option<Station>>;

    /// Stations inside the box (edges inclusive), ordered by id.
    async fn stations_in_bbox(&self, table: &str, bbox: &BoundingBox) -> StoreResult<Vec<Station>>;

    /// Rows of the given stations within `range`, ordered by station then time.
    async fn fetch_rows<T: Observation>(
        &self,
        table: &str,
        station_ids: &[i64],
        range: &TimeRange,
    ) -> StoreResult<Vec<T>>;

    /// Delete every station; observation rows go with them.
    async fn purge_stations(&self, table: &str) -> StoreResult<u64>;

    /// Delete every row of an observation table.
    async fn purge_rows(&self, table: &str) -> StoreResult<u64>;

    async fn count_rows(&self, table: &str) -> StoreResult<u64>;
}
