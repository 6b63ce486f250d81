//! One ETL cycle per domain: read, resolve stations, flatten, load.

use chrono::{DateTime, Utc};
use forecast_common::{CoordKey, Domain, TableKind};
use grid_source::{GriddedDataset, ScatteredDataset};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use storage::{Datastore, Observation};
use tracing::{error, info, instrument};

use crate::archive::select_archive;
use crate::config::EtlConfig;
use crate::error::{IngestionError, Result};
use crate::flatten::{cell_keys, cell_station_ids, flatten_wave, flatten_wind};
use crate::loader::{BulkLoader, LoadOptions};
use crate::normalize::{merge_along_time, normalize};
use crate::stations::{StationAssignment, StationResolver};

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub domain: Domain,
    pub source: String,
    pub stations: usize,
    pub stations_created: usize,
    pub stations_existing: usize,
    pub times: usize,
    pub forecast_rows: usize,
    pub archive_rows: usize,
    pub chunks: usize,
    pub elapsed: Duration,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycle from {}: {} stations ({} new, {} existing) x {} times, \
             {} forecast rows, {} archive rows, {} chunks in {:.2}s",
            self.domain,
            self.source,
            self.stations,
            self.stations_created,
            self.stations_existing,
            self.times,
            self.forecast_rows,
            self.archive_rows,
            self.chunks,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Runs ETL cycles against one datastore.
pub struct EtlPipeline<S> {
    store: S,
    config: EtlConfig,
}

impl<S: Datastore> EtlPipeline<S> {
    pub fn new(store: S, config: EtlConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            chunk_size: self.config.chunk_size,
            maintain_indexes: self.config.maintain_indexes,
            cluster_after_load: self.config.cluster_after_load,
        }
    }

    fn resolver(&self, domain: Domain) -> StationResolver<'_, S> {
        StationResolver::new(&self.store, domain, self.config.station_batch)
    }

    /// Run a wind cycle over an already decoded dataset.
    #[instrument(skip(self, dataset), fields(source = %dataset.source))]
    pub async fn run_wind(&self, dataset: &GriddedDataset) -> Result<CycleReport> {
        let result = self.wind_cycle(dataset).await;
        log_outcome(Domain::Wind, &dataset.source, &result);
        result
    }

    async fn wind_cycle(&self, dataset: &GriddedDataset) -> Result<CycleReport> {
        let started = Instant::now();
        let variables = &self.config.wind;
        let fields = [
            variables.u10.clone(),
            variables.v10.clone(),
            variables.temperature.clone(),
        ];

        let grid = normalize(dataset, &fields)?;
        let keys = cell_keys(&grid, self.config.coordinate_precision)?;
        let assignment = self
            .resolver(Domain::Wind)
            .resolve(&grid.source, keys.iter().copied())
            .await?;
        let station_ids = cell_station_ids(&grid.source, &keys, &assignment)?;
        let rows = flatten_wind(&grid, &station_ids, variables)?;

        self.load_cycle(Domain::Wind, &grid.source, &assignment, &rows, started)
            .await
    }

    /// Run a wave cycle over already joined point records.
    #[instrument(skip(self, dataset), fields(source = %dataset.source))]
    pub async fn run_wave(&self, dataset: &ScatteredDataset) -> Result<CycleReport> {
        let result = self.wave_cycle(dataset).await;
        log_outcome(Domain::Wave, &dataset.source, &result);
        result
    }

    async fn wave_cycle(&self, dataset: &ScatteredDataset) -> Result<CycleReport> {
        let started = Instant::now();
        let precision = self.config.coordinate_precision;

        if dataset.is_empty() {
            return Err(IngestionError::malformed(&dataset.source, "no wave records"));
        }
        let keys = dataset
            .records
            .iter()
            .map(|r| {
                CoordKey::new(r.lat, r.lon, precision).ok_or_else(|| {
                    IngestionError::malformed(
                        &dataset.source,
                        format!("record at {} has non-finite coordinate", r.time),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let assignment = self
            .resolver(Domain::Wave)
            .resolve(&dataset.source, keys)
            .await?;
        let rows = flatten_wave(dataset, &assignment, precision)?;

        self.load_cycle(Domain::Wave, &dataset.source, &assignment, &rows, started)
            .await
    }

    /// Read and merge gridded files along time, then run a wind cycle.
    pub async fn run_wind_files(&self, paths: &[PathBuf]) -> Result<CycleReport> {
        if paths.is_empty() {
            return Err(IngestionError::malformed("wind", "no input files"));
        }

        let variables = self.config.wind.to_gridded();
        let mut datasets = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.clone();
            let variables = variables.clone();
            let dataset =
                tokio::task::spawn_blocking(move || grid_source::read_gridded(&path, &variables))
                    .await
                    .map_err(|e| IngestionError::Task(e.to_string()))??;
            datasets.push(dataset);
        }

        let dataset = merge_along_time(datasets)?;
        self.run_wind(&dataset).await
    }

    /// Read and join the two wave tables, then run a wave cycle.
    pub async fn run_wave_files(&self, tab01: &Path, tab41: &Path) -> Result<CycleReport> {
        let options = self.config.wave_options();
        let (tab01, tab41) = (tab01.to_path_buf(), tab41.to_path_buf());
        let dataset = tokio::task::spawn_blocking(move || {
            grid_source::read_wave_tables(&tab01, &tab41, &options)
        })
        .await
        .map_err(|e| IngestionError::Task(e.to_string()))??;

        self.run_wave(&dataset).await
    }

    async fn load_cycle<T: Observation>(
        &self,
        domain: Domain,
        source: &str,
        assignment: &StationAssignment,
        rows: &[T],
        started: Instant,
    ) -> Result<CycleReport> {
        check_unique_rows(source, rows)?;

        let tables = domain.tables();
        let archive = select_archive(rows, self.config.archive_window(domain), self.config.archive_bound);
        let times: BTreeSet<DateTime<Utc>> = rows.iter().map(|r| r.forecast_time()).collect();

        let loader = BulkLoader::new(&self.store, self.load_options());
        let forecast = loader.replace(&tables, TableKind::Forecast, rows).await?;
        let archived = loader.replace(&tables, TableKind::Archive, &archive).await?;

        Ok(CycleReport {
            domain,
            source: source.to_string(),
            stations: assignment.len(),
            stations_created: assignment.created,
            stations_existing: assignment.existing,
            times: times.len(),
            forecast_rows: forecast.rows,
            archive_rows: archived.rows,
            chunks: forecast.chunks + archived.chunks,
            elapsed: started.elapsed(),
        })
    }
}

/// Each `(station, forecast time)` may appear once. Checked before any table
/// is truncated.
fn check_unique_rows<T: Observation>(source: &str, rows: &[T]) -> Result<()> {
    let mut seen = HashSet::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        if !seen.insert((row.station_id(), row.forecast_time())) {
            return Err(IngestionError::malformed(
                source,
                format!(
                    "row {} repeats station {} at {}",
                    index,
                    row.station_id(),
                    row.forecast_time()
                ),
            ));
        }
    }
    Ok(())
}

fn log_outcome(domain: Domain, source: &str, result: &Result<CycleReport>) {
    match result {
        Ok(report) => info!(
            domain = %domain,
            stations = report.stations,
            forecast_rows = report.forecast_rows,
            archive_rows = report.archive_rows,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cycle complete"
        ),
        Err(e) => error!(domain = %domain, source, error = %e, "Cycle failed"),
    }
}

/// What a purge removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeTarget {
    /// Stations, and every observation referencing them.
    Stations,
    Forecasts,
    Archive,
}

impl FromStr for PurgeTarget {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stations" => Ok(PurgeTarget::Stations),
            "forecast" | "forecasts" => Ok(PurgeTarget::Forecasts),
            "archive" => Ok(PurgeTarget::Archive),
            other => Err(IngestionError::InvalidConfig(format!(
                "unknown purge target '{}' (expected stations, forecasts or archive)",
                other
            ))),
        }
    }
}

/// Delete every row of one of a domain's tables.
pub async fn purge<S: Datastore>(store: &S, domain: Domain, target: PurgeTarget) -> Result<u64> {
    let tables = domain.tables();
    let (table, removed) = match target {
        PurgeTarget::Stations => (&tables.stations, store.purge_stations(&tables.stations).await?),
        PurgeTarget::Forecasts => (&tables.forecasts, store.purge_rows(&tables.forecasts).await?),
        PurgeTarget::Archive => (&tables.archive, store.purge_rows(&tables.archive).await?),
    };
    info!(table = %table, removed, "Purged table");
    Ok(removed)
}
