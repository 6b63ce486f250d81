//! In-memory datastore.
//!
//! Mirrors the relational semantics the pipeline relies on: unique station
//! ids and locations, observation rows keyed by `(station_id, forecast_time)`
//! with cascading deletes, and CSV copy buffers parsed exactly as a `COPY`
//! would. Used for dry runs and tests.

use async_trait::async_trait;
use chrono::Utc;
use csv::StringRecord;
use forecast_common::{BoundingBox, Domain, GeoPoint, TimeRange};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::datastore::{Datastore, IndexSpec};
use crate::error::{StoreError, StoreResult};
use crate::models::{observation_columns, NewStation, Observation, Station};

#[derive(Default)]
struct StationTable {
    rows: BTreeMap<i64, Station>,
    locations: HashSet<(u64, u64)>,
}

impl StationTable {
    fn clear(&mut self) -> u64 {
        let removed = self.rows.len() as u64;
        self.rows.clear();
        self.locations.clear();
        removed
    }
}

struct ObservationTable {
    parent: String,
    columns: StringRecord,
    rows: Vec<StringRecord>,
    keys: HashSet<(i64, String)>,
}

impl ObservationTable {
    fn clear(&mut self) -> u64 {
        let removed = self.rows.len() as u64;
        self.rows.clear();
        self.keys.clear();
        removed
    }
}

#[derive(Default)]
struct MemoryState {
    stations: HashMap<String, StationTable>,
    observations: HashMap<String, ObservationTable>,
    indexes: BTreeMap<String, IndexSpec>,
    clustered: HashMap<String, String>,
}

impl MemoryState {
    fn register(&mut self, domain: Domain) {
        let tables = domain.tables();
        self.stations.entry(tables.stations.clone()).or_default();
        for table in [&tables.forecasts, &tables.archive] {
            self.observations
                .entry(table.clone())
                .or_insert_with(|| ObservationTable {
                    parent: tables.stations.clone(),
                    columns: StringRecord::from(observation_columns(domain).to_vec()),
                    rows: Vec::new(),
                    keys: HashSet::new(),
                });
        }
    }

    fn station_table(&self, table: &str) -> StoreResult<&StationTable> {
        self.stations
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    fn observation_table(&self, table: &str) -> StoreResult<&ObservationTable> {
        self.observations
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    fn has_table(&self, table: &str) -> bool {
        self.stations.contains_key(table) || self.observations.contains_key(table)
    }

    /// Drop observation rows whose parent is `stations`.
    fn cascade(&mut self, stations: &str) {
        for obs in self.observations.values_mut() {
            if obs.parent == stations {
                obs.clear();
            }
        }
    }
}

/// Datastore held entirely in process memory.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    copies: Arc<AtomicUsize>,
    fail_after: Arc<AtomicUsize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store with the tables of every domain already present.
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state.register(Domain::Wind);
        state.register(Domain::Wave);
        Self {
            state: Arc::new(RwLock::new(state)),
            copies: Arc::new(AtomicUsize::new(0)),
            fail_after: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    /// Make every bulk copy after the first `copies` fail.
    pub fn fail_copies_after(&self, copies: usize) {
        self.copies.store(0, Ordering::SeqCst);
        self.fail_after.store(copies, Ordering::SeqCst);
    }

    /// Render an observation table as CSV in storage order.
    pub async fn dump_table(&self, table: &str) -> StoreResult<String> {
        let state = self.state.read().await;
        let obs = state.observation_table(table)?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&obs.columns)
            .map_err(|e| StoreError::copy_format(table, e))?;
        for row in &obs.rows {
            writer
                .write_record(row)
                .map_err(|e| StoreError::copy_format(table, e))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| StoreError::copy_format(table, e))?;
        String::from_utf8(bytes).map_err(|e| StoreError::copy_format(table, e))
    }

    /// Names of the indexes that exist on `table`.
    pub async fn indexes_on(&self, table: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .indexes
            .values()
            .filter(|idx| idx.table == table)
            .map(|idx| idx.name.clone())
            .collect()
    }

    /// Index `table` was last clustered on.
    pub async fn clustered_on(&self, table: &str) -> Option<String> {
        self.state.read().await.clustered.get(table).cloned()
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn migrate(&self) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.register(Domain::Wind);
        state.register(Domain::Wave);
        Ok(())
    }

    async fn load_stations(&self, table: &str) -> StoreResult<Vec<Station>> {
        let state = self.state.read().await;
        Ok(state.station_table(table)?.rows.values().cloned().collect())
    }

    async fn insert_stations(&self, table: &str, stations: &[NewStation]) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let target = state
            .stations
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        let now = Utc::now();
        let mut inserted = 0;
        for station in stations {
            let location = (station.lat.to_bits(), station.lon.to_bits());
            if target.rows.contains_key(&station.id) || !target.locations.insert(location) {
                continue;
            }
            target.rows.insert(
                station.id,
                Station {
                    id: station.id,
                    lat: station.lat,
                    lon: station.lon,
                    name: station.name.clone(),
                    description: station.description.clone(),
                    created_at: now,
                    updated_at: now,
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn truncate(&self, table: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(stations) = state.stations.get_mut(table) {
            stations.clear();
            state.cascade(table);
            return Ok(());
        }
        match state.observations.get_mut(table) {
            Some(obs) => {
                obs.clear();
                Ok(())
            }
            None => Err(StoreError::UnknownTable(table.to_string())),
        }
    }

    async fn bulk_copy(&self, table: &str, columns: &[&str], buffer: Vec<u8>) -> StoreResult<u64> {
        let attempt = self.copies.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.fail_after.load(Ordering::SeqCst) {
            return Err(StoreError::Connection(format!(
                "copy into {} aborted (injected failure after {} copies)",
                table, attempt
            )));
        }

        let mut guard = self.state.write().await;
        let MemoryState {
            stations,
            observations,
            ..
        } = &mut *guard;

        let obs = observations
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        if !obs.columns.iter().eq(columns.iter().copied()) {
            return Err(StoreError::copy_format(
                table,
                format!("columns {:?} do not match table columns", columns),
            ));
        }
        let parent = stations
            .get(&obs.parent)
            .ok_or_else(|| StoreError::UnknownTable(obs.parent.clone()))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(buffer.as_slice());
        let header = reader
            .headers()
            .map_err(|e| StoreError::copy_format(table, e))?
            .clone();
        if header != obs.columns {
            return Err(StoreError::copy_format(table, "buffer header does not match columns"));
        }

        let mut staged = Vec::new();
        let mut staged_keys = HashSet::new();
        for record in reader.records() {
            let record = record.map_err(|e| StoreError::copy_format(table, e))?;
            let station_id: i64 = record
                .get(0)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| StoreError::copy_format(table, "station_id is not an integer"))?;
            if !parent.rows.contains_key(&station_id) {
                return Err(StoreError::constraint(
                    table,
                    format!("station {} not present in {}", station_id, obs.parent),
                ));
            }
            let key = (station_id, record.get(1).unwrap_or_default().to_string());
            if obs.keys.contains(&key) || !staged_keys.insert(key.clone()) {
                return Err(StoreError::constraint(
                    table,
                    format!("duplicate row for station {} at {}", key.0, key.1),
                ));
            }
            staged.push(record);
        }

        let copied = staged.len() as u64;
        obs.rows.extend(staged);
        obs.keys.extend(staged_keys);
        debug!(table, rows = copied, "Copied buffer");
        Ok(copied)
    }

    async fn ensure_index(&self, index: &IndexSpec) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.has_table(&index.table) {
            return Err(StoreError::UnknownTable(index.table.clone()));
        }
        state
            .indexes
            .entry(index.name.clone())
            .or_insert_with(|| index.clone());
        Ok(())
    }

    async fn cluster(&self, table: &str, index: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.indexes.get(index) {
            Some(spec) if spec.table == table => {}
            _ => {
                return Err(StoreError::Database(format!(
                    "index \"{}\" for table \"{}\" does not exist",
                    index, table
                )))
            }
        }
        // Storage order only changes for observation tables.
        if let Some(obs) = state.observations.get_mut(table) {
            obs.rows.sort_by(|a, b| {
                let time = a.get(1).cmp(&b.get(1));
                let station = |r: &StringRecord| r.get(0).and_then(|s| s.parse::<i64>().ok());
                time.then_with(|| station(a).cmp(&station(b)))
            });
        }
        state.clustered.insert(table.to_string(), index.to_string());
        Ok(())
    }

    async fn station_by_name(&self, table: &str, name: &str) -> StoreResult<Option<Station>> {
        let state = self.state.read().await;
        Ok(state
            .station_table(table)?
            .rows
            .values()
            .find(|s| s.name == name)
            .cloned())
    }

    async fn nearest_station(&self, table: &str, point: GeoPoint) -> StoreResult<Option<Station>> {
        let state = self.state.read().await;
        Ok(state
            .station_table(table)?
            .rows
            .values()
            .map(|s| (s.point().distance_km(&point), s))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)))
            .map(|(_, s)| s.clone()))
    }

    async fn stations_in_bbox(&self, table: &str, bbox: &BoundingBox) -> StoreResult<Vec<Station>> {
        let state = self.state.read().await;
        Ok(state
            .station_table(table)?
            .rows
            .values()
            .filter(|s| bbox.contains(&s.point()))
            .cloned()
            .collect())
    }

    async fn fetch_rows<T: Observation>(
        &self,
        table: &str,
        station_ids: &[i64],
        range: &TimeRange,
    ) -> StoreResult<Vec<T>> {
        let state = self.state.read().await;
        let obs = state.observation_table(table)?;
        if !obs.columns.iter().eq(T::COLUMNS.iter().copied()) {
            return Err(StoreError::copy_format(table, "row type does not match table columns"));
        }

        let wanted: HashSet<i64> = station_ids.iter().copied().collect();
        let mut rows = Vec::new();
        for record in &obs.rows {
            let row: T = record
                .deserialize(Some(&obs.columns))
                .map_err(|e| StoreError::copy_format(table, e))?;
            if wanted.contains(&row.station_id()) && range.contains(&row.forecast_time()) {
                rows.push(row);
            }
        }
        rows.sort_by_key(|r| (r.station_id(), r.forecast_time()));
        Ok(rows)
    }

    async fn purge_stations(&self, table: &str) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let removed = state
            .stations
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?
            .clear();
        state.cascade(table);
        Ok(removed)
    }

    async fn purge_rows(&self, table: &str) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        Ok(state
            .observations
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?
            .clear())
    }

    async fn count_rows(&self, table: &str) -> StoreResult<u64> {
        let state = self.state.read().await;
        if let Some(stations) = state.stations.get(table) {
            return Ok(stations.rows.len() as u64);
        }
        Ok(state.observation_table(table)?.rows.len() as u64)
    }
}
