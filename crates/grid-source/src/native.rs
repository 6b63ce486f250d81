//! Native NetCDF reading via the `netcdf` crate.
//!
//! System requirements: libnetcdf-dev (with HDF5).

use chrono::{DateTime, Utc};
use ndarray::{ArrayD, IxDyn};
use netcdf::AttributeValue;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::dataset::{GriddedDataset, GriddedVariables};
use crate::error::{SourceError, SourceResult};
use crate::time_units::TimeUnits;

/// Read coordinate, time and field arrays from a NetCDF file.
///
/// Arrays keep their on-disk shape; squeezing happens downstream.
#[instrument(skip(variables), fields(path = %path.display()))]
pub fn read_gridded(path: &Path, variables: &GriddedVariables) -> SourceResult<GriddedDataset> {
    let source = path.display().to_string();

    let file = netcdf::open(path)
        .map_err(|e| SourceError::invalid(&source, format!("failed to open NetCDF: {}", e)))?;

    let lat = read_array(&file, &source, &variables.lat)?;
    let lon = read_array(&file, &source, &variables.lon)?;
    let times = read_times(&file, &source, &variables.time)?;

    let mut fields = BTreeMap::new();
    for name in &variables.fields {
        let array = read_array(&file, &source, name)?;
        debug!(field = %name, shape = ?array.shape(), "Read field");
        fields.insert(name.clone(), array);
    }

    info!(
        lat_shape = ?lat.shape(),
        times = times.len(),
        fields = fields.len(),
        "Read gridded dataset"
    );

    Ok(GriddedDataset {
        source,
        lat,
        lon,
        times,
        fields,
    })
}

fn variable<'f>(
    file: &'f netcdf::File,
    source: &str,
    name: &str,
) -> SourceResult<netcdf::Variable<'f>> {
    file.variable(name)
        .ok_or_else(|| SourceError::missing(source, format!("variable '{}'", name)))
}

fn read_array(file: &netcdf::File, source: &str, name: &str) -> SourceResult<ArrayD<f64>> {
    let var = variable(file, source, name)?;
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

    let values: Vec<f64> = var
        .get_values(..)
        .map_err(|e| SourceError::invalid(source, format!("failed to read '{}': {}", name, e)))?;

    let fill = var
        .attribute_value("_FillValue")
        .and_then(|v| v.ok())
        .and_then(|v| f64::try_from(v).ok());
    let values = match fill {
        Some(fill) => values
            .into_iter()
            .map(|v| if v == fill { f64::NAN } else { v })
            .collect(),
        None => values,
    };

    ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| {
        SourceError::invalid(source, format!("'{}' does not match shape {:?}: {}", name, shape, e))
    })
}

fn read_times(file: &netcdf::File, source: &str, name: &str) -> SourceResult<Vec<DateTime<Utc>>> {
    let var = variable(file, source, name)?;

    let units = match var.attribute_value("units") {
        Some(Ok(AttributeValue::Str(units))) => units,
        _ => return Err(SourceError::missing(source, format!("'units' attribute on '{}'", name))),
    };
    let units = TimeUnits::parse(&units)?;

    let raw: Vec<f64> = var
        .get_values(..)
        .map_err(|e| SourceError::invalid(source, format!("failed to read '{}': {}", name, e)))?;

    raw.iter()
        .map(|&v| {
            units.to_datetime(v).ok_or_else(|| {
                SourceError::invalid(source, format!("value {} in '{}' is not a representable time", v, name))
            })
        })
        .collect()
}
