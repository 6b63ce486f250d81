//! In-memory representations of decoded source datasets.

use chrono::{DateTime, Utc};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{SourceError, SourceResult};

/// Names of the variables read from a gridded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GriddedVariables {
    pub lat: String,
    pub lon: String,
    pub time: String,
    /// Physical fields to load, in output order.
    pub fields: Vec<String>,
}

impl Default for GriddedVariables {
    /// WRF-style surface output.
    fn default() -> Self {
        Self {
            lat: "XLAT".to_string(),
            lon: "XLONG".to_string(),
            time: "XTIME".to_string(),
            fields: vec!["U10".to_string(), "V10".to_string(), "T2".to_string()],
        }
    }
}

/// A decoded gridded dataset.
///
/// Coordinate arrays keep the shape they had in the file; fields share a
/// `(time, y, x)` or `(time, station)` layout.
#[derive(Debug, Clone)]
pub struct GriddedDataset {
    /// Where this dataset came from (file path or fixture name).
    pub source: String,
    pub lat: ArrayD<f64>,
    pub lon: ArrayD<f64>,
    pub times: Vec<DateTime<Utc>>,
    pub fields: BTreeMap<String, ArrayD<f64>>,
}

impl GriddedDataset {
    pub fn field(&self, name: &str) -> SourceResult<&ArrayD<f64>> {
        self.fields
            .get(name)
            .ok_or_else(|| SourceError::missing(&self.source, format!("field '{}'", name)))
    }
}

impl fmt::Display for GriddedDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (lat {:?}, lon {:?}, {} times, fields {:?})",
            self.source,
            self.lat.shape(),
            self.lon.shape(),
            self.times.len(),
            self.fields.keys().collect::<Vec<_>>()
        )
    }
}

/// One scattered observation keyed by `(time, lat, lon)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    /// Values in the order of [`ScatteredDataset::field_names`].
    pub values: Vec<f64>,
}

/// A flat list of point records, e.g. joined wave tables.
#[derive(Debug, Clone, Default)]
pub struct ScatteredDataset {
    pub source: String,
    pub field_names: Vec<String>,
    pub records: Vec<PointRecord>,
}

impl ScatteredDataset {
    /// Position of a field within each record's values.
    pub fn field_index(&self, name: &str) -> SourceResult<usize> {
        self.field_names
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| SourceError::missing(&self.source, format!("field '{}'", name)))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
