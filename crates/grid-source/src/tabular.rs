//! Paired CSV reader for the wave model's `tab01` / `tab41` exports.
//!
//! Both tables are keyed by `(time, lat, lon)`. `tab01` carries the primary
//! fields and drives record order; `tab41` is joined onto it. Keys present in
//! only one table are dropped, and duplicate keys keep their first row.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use forecast_common::{CoordKey, DEFAULT_COORDINATE_PRECISION};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::dataset::{PointRecord, ScatteredDataset};
use crate::error::{SourceError, SourceResult};

/// Column layout of the wave tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularOptions {
    pub time_column: String,
    pub lat_column: String,
    pub lon_column: String,
    /// `chrono` format of the time column.
    pub time_format: String,
    /// Skip the units line that follows the header.
    pub skip_units_row: bool,
    /// Fields taken from `tab01`.
    pub primary_fields: Vec<String>,
    /// Fields taken from `tab41`.
    pub secondary_fields: Vec<String>,
    /// Decimal digits used when matching coordinates across tables.
    pub precision: u32,
}

impl Default for TabularOptions {
    fn default() -> Self {
        Self {
            time_column: "Time".to_string(),
            lat_column: "Lat".to_string(),
            lon_column: "Long".to_string(),
            time_format: "%Y/%m/%d %H:%M:%S".to_string(),
            skip_units_row: true,
            primary_fields: vec!["Tp".to_string()],
            secondary_fields: vec!["Hs".to_string(), "Tr".to_string(), "Dir".to_string()],
            precision: DEFAULT_COORDINATE_PRECISION,
        }
    }
}

impl TabularOptions {
    /// Output field order: primary fields, then secondary fields.
    pub fn field_names(&self) -> Vec<String> {
        self.primary_fields
            .iter()
            .chain(self.secondary_fields.iter())
            .cloned()
            .collect()
    }
}

/// Read and join the two wave tables from disk.
pub fn read_wave_tables(
    tab01: &Path,
    tab41: &Path,
    options: &TabularOptions,
) -> SourceResult<ScatteredDataset> {
    let open = |path: &Path| {
        File::open(path).map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })
    };

    let source = format!("{} + {}", tab01.display(), tab41.display());
    read_wave_tables_from_readers(open(tab01)?, open(tab41)?, &source, options)
}

/// Read and join the two wave tables from arbitrary readers.
pub fn read_wave_tables_from_readers<A: Read, B: Read>(
    tab01: A,
    tab41: B,
    source: &str,
    options: &TabularOptions,
) -> SourceResult<ScatteredDataset> {
    let primary = read_table(tab01, &format!("{} [tab01]", source), &options.primary_fields, options)?;
    let secondary = read_table(tab41, &format!("{} [tab41]", source), &options.secondary_fields, options)?;

    let mut lookup: HashMap<(DateTime<Utc>, CoordKey), Vec<f64>> =
        HashMap::with_capacity(secondary.len());
    for row in secondary {
        lookup.entry((row.time, row.key)).or_insert(row.values);
    }

    let mut seen = HashSet::with_capacity(primary.len());
    let mut records = Vec::with_capacity(primary.len());
    let mut unmatched = 0usize;
    let mut duplicates = 0usize;

    for row in primary {
        let key = (row.time, row.key);
        let Some(extra) = lookup.get(&key) else {
            unmatched += 1;
            continue;
        };
        if !seen.insert(key) {
            duplicates += 1;
            continue;
        }

        let mut values = row.values;
        values.extend_from_slice(extra);
        records.push(PointRecord {
            time: row.time,
            lat: row.lat,
            lon: row.lon,
            values,
        });
    }

    if unmatched > 0 {
        warn!(source, unmatched, "tab01 rows without a matching tab41 row were dropped");
    }
    if duplicates > 0 {
        debug!(source, duplicates, "Dropped duplicate (time, lat, lon) rows");
    }
    info!(source, records = records.len(), "Joined wave tables");

    Ok(ScatteredDataset {
        source: source.to_string(),
        field_names: options.field_names(),
        records,
    })
}

struct TableRow {
    time: DateTime<Utc>,
    key: CoordKey,
    lat: f64,
    lon: f64,
    values: Vec<f64>,
}

fn read_table<R: Read>(
    reader: R,
    source: &str,
    fields: &[String],
    options: &TabularOptions,
) -> SourceResult<Vec<TableRow>> {
    let csv_err = |source_err: csv::Error| SourceError::Csv {
        source_name: source.to_string(),
        source: source_err,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SourceError::missing(source, format!("column '{}'", name)))
    };

    let time_idx = column(&options.time_column)?;
    let lat_idx = column(&options.lat_column)?;
    let lon_idx = column(&options.lon_column)?;
    let field_idx = fields
        .iter()
        .map(|f| column(f))
        .collect::<SourceResult<Vec<_>>>()?;

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        if i == 0 && options.skip_units_row {
            continue;
        }
        // Header is line 1.
        let line = i + 2;

        let raw_time = record.get(time_idx).unwrap_or_default();
        let time = NaiveDateTime::parse_from_str(raw_time, &options.time_format)
            .map(|ndt| Utc.from_utc_datetime(&ndt))
            .map_err(|e| {
                SourceError::invalid(source, format!("line {}: time '{}': {}", line, raw_time, e))
            })?;

        let lat = numeric(record.get(lat_idx));
        let lon = numeric(record.get(lon_idx));
        let key = CoordKey::new(lat, lon, options.precision).ok_or_else(|| {
            SourceError::invalid(
                source,
                format!(
                    "line {}: coordinate ({}, {}) is not numeric",
                    line,
                    record.get(lat_idx).unwrap_or_default(),
                    record.get(lon_idx).unwrap_or_default()
                ),
            )
        })?;

        let values = field_idx.iter().map(|&idx| numeric(record.get(idx))).collect();
        rows.push(TableRow {
            time,
            key,
            lat,
            lon,
            values,
        });
    }

    debug!(source, rows = rows.len(), "Read table");
    Ok(rows)
}

/// Non-numeric cells coerce to NaN.
fn numeric(cell: Option<&str>) -> f64 {
    cell.and_then(|s| s.parse::<f64>().ok()).unwrap_or(f64::NAN)
}
