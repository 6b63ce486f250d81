//! Row flattening: `(time, cell)` arrays and point records to one row per
//! `(station, time)`, ordered by station id then time.

use chrono::{DateTime, Utc};
use forecast_common::CoordKey;
use grid_source::ScatteredDataset;
use ndarray::Array1;
use std::collections::HashSet;
use storage::{WaveObservation, WindObservation};
use tracing::debug;

use crate::config::WindVariables;
use crate::derived::{derive_wind, max_wave_height};
use crate::error::{IngestionError, Result};
use crate::normalize::NormalizedGrid;
use crate::stations::StationAssignment;

/// Coordinate key of every cell, in cell order.
pub fn cell_keys(grid: &NormalizedGrid, precision: u32) -> Result<Vec<CoordKey>> {
    grid.cells()
        .enumerate()
        .map(|(i, (lat, lon))| {
            CoordKey::new(lat, lon, precision).ok_or_else(|| {
                IngestionError::malformed(
                    &grid.source,
                    format!("cell {} has non-finite coordinate ({}, {})", i, lat, lon),
                )
            })
        })
        .collect()
}

/// Station id of every cell. Fails if a cell has no station or two cells
/// share one.
pub fn cell_station_ids(
    source: &str,
    keys: &[CoordKey],
    stations: &StationAssignment,
) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(keys.len());
    let mut unresolved = Vec::new();
    for key in keys {
        match stations.get(key) {
            Some(id) => ids.push(id),
            None => unresolved.push(key),
        }
    }
    if let Some(first) = unresolved.first() {
        return Err(IngestionError::StationMismatch {
            source_name: source.to_string(),
            unresolved: unresolved.len(),
            cells: keys.len(),
            example: first.to_string(),
        });
    }

    let distinct: HashSet<i64> = ids.iter().copied().collect();
    if distinct.len() != ids.len() {
        return Err(IngestionError::malformed(
            source,
            format!(
                "{} grid cells collapse onto {} coordinates at the configured precision",
                ids.len(),
                distinct.len()
            ),
        ));
    }
    Ok(ids)
}

fn check_count(table: &str, actual: usize, stations: usize, times: usize) -> Result<()> {
    let expected = stations * times;
    if actual != expected {
        return Err(IngestionError::RowCountMismatch {
            table: table.to_string(),
            expected,
            actual,
            stations,
            times,
        });
    }
    Ok(())
}

/// Flatten a normalized wind grid into observation rows.
pub fn flatten_wind(
    grid: &NormalizedGrid,
    station_ids: &[i64],
    variables: &WindVariables,
) -> Result<Vec<WindObservation>> {
    let (n_times, n_cells) = (grid.n_times(), grid.n_cells());
    if station_ids.len() != n_cells {
        return Err(IngestionError::malformed(
            &grid.source,
            format!("{} station ids for {} cells", station_ids.len(), n_cells),
        ));
    }

    let u = grid.field(&variables.u10)?;
    let v = grid.field(&variables.v10)?;
    let temperature = grid.field(&variables.temperature)?;
    let wind = derive_wind(u.view(), v.view())?;

    let mut cells: Vec<usize> = (0..n_cells).collect();
    cells.sort_by_key(|&c| station_ids[c]);

    let mut rows = Vec::with_capacity(n_cells * n_times);
    for c in cells {
        for (t, time) in grid.times.iter().enumerate() {
            rows.push(WindObservation {
                station_id: station_ids[c],
                forecast_time: *time,
                temperature: temperature[[t, c]],
                ws10: wind.ws10[[t, c]],
                wind_direction: wind.direction[[t, c]],
                wg10: wind.wg10[[t, c]],
                ws50: wind.ws50[[t, c]],
                wg50: wind.wg50[[t, c]],
            });
        }
    }

    check_count("wind", rows.len(), n_cells, n_times)?;
    debug!(rows = rows.len(), stations = n_cells, times = n_times, "Flattened wind grid");
    Ok(rows)
}

/// Flatten joined wave records into observation rows.
///
/// Records repeating a `(time, coordinate)` keep the first occurrence. Field
/// order is `[Tp, Hs, Tr, Dir]`.
pub fn flatten_wave(
    dataset: &ScatteredDataset,
    stations: &StationAssignment,
    precision: u32,
) -> Result<Vec<WaveObservation>> {
    if dataset.field_names.len() != 4 {
        return Err(IngestionError::malformed(
            &dataset.source,
            format!(
                "expected 4 wave fields (Tp, Hs, Tr, Dir), got {:?}",
                dataset.field_names
            ),
        ));
    }

    let mut seen: HashSet<(DateTime<Utc>, CoordKey)> = HashSet::with_capacity(dataset.len());
    let mut kept = Vec::with_capacity(dataset.len());
    let mut unresolved = 0usize;
    let mut example = None;

    for record in &dataset.records {
        if record.values.len() != 4 {
            return Err(IngestionError::malformed(
                &dataset.source,
                format!("record at {} has {} values", record.time, record.values.len()),
            ));
        }
        let key = CoordKey::new(record.lat, record.lon, precision).ok_or_else(|| {
            IngestionError::malformed(
                &dataset.source,
                format!("record at {} has non-finite coordinate", record.time),
            )
        })?;
        if !seen.insert((record.time, key)) {
            continue;
        }
        match stations.get(&key) {
            Some(id) => kept.push((id, record)),
            None => {
                unresolved += 1;
                example.get_or_insert(key);
            }
        }
    }

    if let Some(key) = example {
        return Err(IngestionError::StationMismatch {
            source_name: dataset.source.clone(),
            unresolved,
            cells: seen.len(),
            example: key.to_string(),
        });
    }

    let hs = Array1::from_iter(kept.iter().map(|(_, r)| r.values[1]));
    let hmax = max_wave_height(hs.view());

    let mut rows: Vec<WaveObservation> = kept
        .iter()
        .zip(hmax.iter())
        .map(|((id, r), &hmax)| WaveObservation {
            station_id: *id,
            forecast_time: r.time,
            tp: r.values[0],
            hs: r.values[1],
            hmax,
            tz: r.values[2],
            wave_direction: r.values[3],
        })
        .collect();
    rows.sort_by_key(|r| (r.station_id, r.forecast_time));

    check_count("wave", rows.len(), seen.len(), 1)?;
    debug!(rows = rows.len(), records = dataset.len(), "Flattened wave records");
    Ok(rows)
}
