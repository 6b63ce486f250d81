//! Grid normalization.
//!
//! Turns a decoded [`GriddedDataset`] into a canonical cell list plus
//! `(time, cell)` field arrays. Cell index `y * nx + x` is used for both
//! rectilinear and curvilinear meshes, matching row-major field layout.

use chrono::{DateTime, Utc};
use grid_source::GriddedDataset;
use ndarray::{concatenate, Array1, Array2, ArrayD, ArrayView2, ArrayViewD, Axis, Ix2};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::error::{IngestionError, Result};

/// Coordinates of a dense mesh varying independently along each axis are
/// treated as equal within this tolerance.
const AXIS_TOLERANCE: f64 = 1e-9;

/// How grid cells map to coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum GridLayout {
    /// Independent axes; cell `y * lons.len() + x` is at `(lats[y], lons[x])`.
    Rectilinear { lats: Array1<f64>, lons: Array1<f64> },
    /// One coordinate pair per cell.
    Scattered { lats: Array1<f64>, lons: Array1<f64> },
}

/// A dataset reduced to cells, times and `(time, cell)` fields.
#[derive(Debug, Clone)]
pub struct NormalizedGrid {
    pub source: String,
    pub layout: GridLayout,
    pub times: Vec<DateTime<Utc>>,
    pub fields: BTreeMap<String, Array2<f64>>,
}

impl NormalizedGrid {
    pub fn n_cells(&self) -> usize {
        match &self.layout {
            GridLayout::Rectilinear { lats, lons } => lats.len() * lons.len(),
            GridLayout::Scattered { lats, .. } => lats.len(),
        }
    }

    pub fn n_times(&self) -> usize {
        self.times.len()
    }

    pub fn is_rectilinear(&self) -> bool {
        matches!(self.layout, GridLayout::Rectilinear { .. })
    }

    /// `(lat, lon)` of a cell.
    pub fn cell(&self, index: usize) -> (f64, f64) {
        match &self.layout {
            GridLayout::Rectilinear { lats, lons } => {
                let nx = lons.len();
                (lats[index / nx], lons[index % nx])
            }
            GridLayout::Scattered { lats, lons } => (lats[index], lons[index]),
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        (0..self.n_cells()).map(move |i| self.cell(i))
    }

    pub fn field(&self, name: &str) -> Result<&Array2<f64>> {
        self.fields
            .get(name)
            .ok_or_else(|| IngestionError::malformed(&self.source, format!("field '{}' not loaded", name)))
    }
}

/// Drop leading axes of a coordinate array (e.g. a time axis on `XLAT`),
/// keeping the first slice, until at most two dimensions remain.
fn squeeze_leading(array: &ArrayD<f64>) -> ArrayViewD<'_, f64> {
    let mut view = array.view();
    while view.ndim() > 2 {
        view = view.index_axis_move(Axis(0), 0);
    }
    view
}

fn is_separable(lat: &ArrayView2<f64>, lon: &ArrayView2<f64>) -> bool {
    let (ny, nx) = lat.dim();
    (0..ny).all(|y| {
        (0..nx).all(|x| {
            (lat[[y, x]] - lat[[y, 0]]).abs() <= AXIS_TOLERANCE
                && (lon[[y, x]] - lon[[0, x]]).abs() <= AXIS_TOLERANCE
        })
    })
}

/// Normalize coordinates, times and the named fields of a gridded dataset.
pub fn normalize(dataset: &GriddedDataset, field_names: &[String]) -> Result<NormalizedGrid> {
    let source = dataset.source.as_str();
    let malformed = |message: String| IngestionError::malformed(source, message);

    if dataset.times.is_empty() {
        return Err(malformed("time axis is empty".to_string()));
    }
    if let Some(i) = dataset.times.windows(2).position(|w| w[1] <= w[0]) {
        let (prev, next) = (dataset.times[i], dataset.times[i + 1]);
        let what = if next == prev { "repeats" } else { "decreases" };
        return Err(malformed(format!(
            "time axis {} at index {} ({} -> {})",
            what,
            i + 1,
            prev,
            next
        )));
    }

    let lat = squeeze_leading(&dataset.lat);
    let lon = squeeze_leading(&dataset.lon);
    if lat.ndim() != lon.ndim() {
        return Err(malformed(format!(
            "latitude is {}-D but longitude is {}-D",
            lat.ndim(),
            lon.ndim()
        )));
    }

    let n_times = dataset.times.len();
    let (layout, spatial_shape) = match lat.ndim() {
        1 => {
            let lats = lat.iter().copied().collect::<Array1<f64>>();
            let lons = lon.iter().copied().collect::<Array1<f64>>();
            let first = field_names
                .first()
                .ok_or_else(|| malformed("no fields requested".to_string()))?;
            let probe = dataset.field(first).map_err(|e| malformed(e.to_string()))?;
            match probe.ndim() {
                3 => {
                    let shape = vec![lats.len(), lons.len()];
                    (GridLayout::Rectilinear { lats, lons }, shape)
                }
                2 if lats.len() == lons.len() => {
                    let shape = vec![lats.len()];
                    (GridLayout::Scattered { lats, lons }, shape)
                }
                2 => {
                    return Err(malformed(format!(
                        "station list has {} latitudes but {} longitudes",
                        lats.len(),
                        lons.len()
                    )))
                }
                n => {
                    return Err(malformed(format!(
                        "field '{}' is {}-D; expected (time, y, x) or (time, station)",
                        first, n
                    )))
                }
            }
        }
        2 => {
            if lat.shape() != lon.shape() {
                return Err(malformed(format!(
                    "latitude mesh {:?} and longitude mesh {:?} differ",
                    lat.shape(),
                    lon.shape()
                )));
            }
            let lat = lat
                .into_dimensionality::<Ix2>()
                .map_err(|e| malformed(format!("latitude mesh: {}", e)))?;
            let lon = lon
                .into_dimensionality::<Ix2>()
                .map_err(|e| malformed(format!("longitude mesh: {}", e)))?;
            let (ny, nx) = lat.dim();
            let layout = if is_separable(&lat, &lon) {
                debug!(source, ny, nx, "Collapsing rectilinear mesh to axes");
                GridLayout::Rectilinear {
                    lats: (0..ny).map(|y| lat[[y, 0]]).collect(),
                    lons: (0..nx).map(|x| lon[[0, x]]).collect(),
                }
            } else {
                debug!(source, ny, nx, "Curvilinear mesh kept as scattered cells");
                GridLayout::Scattered {
                    lats: lat.iter().copied().collect(),
                    lons: lon.iter().copied().collect(),
                }
            };
            (layout, vec![ny, nx])
        }
        n => return Err(malformed(format!("coordinates are {}-D after squeezing", n))),
    };

    let n_cells: usize = spatial_shape.iter().product();
    let mut expected_shape = vec![n_times];
    expected_shape.extend_from_slice(&spatial_shape);

    let mut fields = BTreeMap::new();
    for name in field_names {
        let array = dataset.field(name).map_err(|e| malformed(e.to_string()))?;
        if array.shape() != expected_shape.as_slice() {
            return Err(malformed(format!(
                "field '{}' has shape {:?}, expected {:?}",
                name,
                array.shape(),
                expected_shape
            )));
        }
        let flat = array
            .as_standard_layout()
            .into_owned()
            .into_shape((n_times, n_cells))
            .map_err(|e| malformed(format!("cannot reshape '{}': {}", name, e)))?;
        fields.insert(name.clone(), flat);
    }

    let grid = NormalizedGrid {
        source: source.to_string(),
        layout,
        times: dataset.times.clone(),
        fields,
    };
    info!(
        source,
        cells = grid.n_cells(),
        times = grid.n_times(),
        rectilinear = grid.is_rectilinear(),
        "Normalized grid"
    );
    Ok(grid)
}

/// Concatenate datasets sharing one grid along the time axis, ordered by
/// their first timestamp. A timestamp present in more than one file (a
/// shared boundary hour) is taken from the earliest file.
pub fn merge_along_time(mut datasets: Vec<GriddedDataset>) -> Result<GriddedDataset> {
    datasets.sort_by_key(|d| d.times.first().copied());
    let mut iter = datasets.into_iter();
    let Some(first) = iter.next() else {
        return Err(IngestionError::malformed("merge", "no datasets to merge"));
    };
    let rest: Vec<GriddedDataset> = iter.collect();
    if rest.is_empty() {
        return Ok(first);
    }

    let mut sources = vec![first.source.clone()];
    let mut times = first.times.clone();
    let mut seen: BTreeSet<DateTime<Utc>> = first.times.iter().copied().collect();
    let mut keep = Vec::with_capacity(rest.len());
    let mut dropped = 0;
    for other in &rest {
        if squeeze_leading(&other.lat) != squeeze_leading(&first.lat)
            || squeeze_leading(&other.lon) != squeeze_leading(&first.lon)
        {
            return Err(IngestionError::malformed(
                &other.source,
                format!("grid differs from {}", first.source),
            ));
        }
        let indices: Vec<usize> = (0..other.times.len())
            .filter(|&i| seen.insert(other.times[i]))
            .collect();
        dropped += other.times.len() - indices.len();
        times.extend(indices.iter().map(|&i| other.times[i]));
        sources.push(other.source.clone());
        keep.push(indices);
    }
    if dropped > 0 {
        debug!(dropped, "Dropped timestamps already present in an earlier file");
    }

    let mut fields = BTreeMap::new();
    for (name, array) in &first.fields {
        let mut parts = Vec::with_capacity(rest.len());
        for (other, indices) in rest.iter().zip(&keep) {
            let part = other.fields.get(name).ok_or_else(|| {
                IngestionError::malformed(&other.source, format!("field '{}' missing", name))
            })?;
            if part.ndim() == 0 || part.len_of(Axis(0)) != other.times.len() {
                return Err(IngestionError::malformed(
                    &other.source,
                    format!("field '{}' does not follow the time axis", name),
                ));
            }
            parts.push(part.select(Axis(0), indices));
        }
        let mut views = vec![array.view()];
        views.extend(parts.iter().map(|p| p.view()));
        let joined = concatenate(Axis(0), &views).map_err(|e| {
            IngestionError::malformed(sources.join(", "), format!("cannot concatenate '{}': {}", name, e))
        })?;
        fields.insert(name.clone(), joined);
    }

    info!(files = sources.len(), times = times.len(), "Merged datasets along time");
    Ok(GriddedDataset {
        source: sources.join(", "),
        lat: first.lat,
        lon: first.lon,
        times,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ndarray::{Array, Array3};

    fn times(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2025, 8, 10, 0, 0, 0).unwrap();
        (0..n).map(|h| base + Duration::hours(h as i64)).collect()
    }

    fn dataset(lat: ArrayD<f64>, lon: ArrayD<f64>, field: ArrayD<f64>, n_times: usize) -> GriddedDataset {
        let mut fields = BTreeMap::new();
        fields.insert("U10".to_string(), field);
        GriddedDataset {
            source: "test".to_string(),
            lat,
            lon,
            times: times(n_times),
            fields,
        }
    }

    fn names() -> Vec<String> {
        vec!["U10".to_string()]
    }

    #[test]
    fn test_mesh_with_time_axis_collapses() {
        // (time=1, y=2, x=3) meshes as WRF writes them
        let lat = Array::from_shape_fn((1, 2, 3), |(_, y, _)| 24.0 + y as f64).into_dyn();
        let lon = Array::from_shape_fn((1, 2, 3), |(_, _, x)| 54.0 + x as f64).into_dyn();
        let field = Array3::<f64>::zeros((4, 2, 3)).into_dyn();

        let grid = normalize(&dataset(lat, lon, field, 4), &names()).unwrap();
        assert!(grid.is_rectilinear());
        assert_eq!(grid.n_cells(), 6);
        assert_eq!(grid.cell(4), (25.0, 55.0));
        assert_eq!(grid.field("U10").unwrap().shape(), &[4, 6]);
    }

    #[test]
    fn test_curvilinear_mesh_is_scattered() {
        let lat = Array::from_shape_fn((2, 2), |(y, x)| 24.0 + y as f64 + 0.1 * x as f64).into_dyn();
        let lon = Array::from_shape_fn((2, 2), |(_, x)| 54.0 + x as f64).into_dyn();
        let field = Array3::<f64>::zeros((1, 2, 2)).into_dyn();

        let grid = normalize(&dataset(lat, lon, field, 1), &names()).unwrap();
        assert!(!grid.is_rectilinear());
        let (lat, lon) = grid.cell(1);
        assert!((lat - 24.1).abs() < 1e-12);
        assert_eq!(lon, 55.0);
    }

    #[test]
    fn test_station_list() {
        let lat = Array::from(vec![1.0, 2.0, 3.0]).into_dyn();
        let lon = Array::from(vec![4.0, 5.0, 6.0]).into_dyn();
        let field = Array::from_shape_fn((2, 3), |(t, s)| (t * 10 + s) as f64).into_dyn();

        let grid = normalize(&dataset(lat, lon, field, 2), &names()).unwrap();
        assert_eq!(grid.n_cells(), 3);
        assert_eq!(grid.field("U10").unwrap()[[1, 2]], 12.0);
    }

    #[test]
    fn test_field_shape_mismatch() {
        let lat = Array::from(vec![1.0, 2.0]).into_dyn();
        let lon = Array::from(vec![4.0, 5.0, 6.0]).into_dyn();
        let field = Array3::<f64>::zeros((2, 3, 2)).into_dyn();

        let err = normalize(&dataset(lat, lon, field, 2), &names()).unwrap_err();
        assert!(matches!(err, IngestionError::InputMalformed { .. }));
    }

    #[test]
    fn test_decreasing_times_rejected() {
        let lat = Array::from(vec![1.0]).into_dyn();
        let lon = Array::from(vec![4.0]).into_dyn();
        let field = Array3::<f64>::zeros((2, 1, 1)).into_dyn();
        let mut ds = dataset(lat, lon, field, 2);
        ds.times.reverse();
        assert!(normalize(&ds, &names()).is_err());
    }

    #[test]
    fn test_repeated_times_rejected() {
        let lat = Array::from(vec![1.0]).into_dyn();
        let lon = Array::from(vec![4.0]).into_dyn();
        let field = Array3::<f64>::zeros((3, 1, 1)).into_dyn();
        let mut ds = dataset(lat, lon, field, 3);
        ds.times[2] = ds.times[1];

        let err = normalize(&ds, &names()).unwrap_err();
        assert!(matches!(err, IngestionError::InputMalformed { .. }));
        assert!(err.to_string().contains("repeats"), "{}", err);
    }

    #[test]
    fn test_merge_keeps_first_copy_of_shared_hour() {
        let lat = Array::from(vec![1.0]).into_dyn();
        let lon = Array::from(vec![4.0]).into_dyn();
        // hours 0..=3 and 3..=6, both files carry hour 3
        let early = dataset(lat.clone(), lon.clone(), Array3::from_elem((4, 1, 1), 1.0).into_dyn(), 4);
        let mut late = dataset(lat, lon, Array3::from_elem((4, 1, 1), 2.0).into_dyn(), 4);
        late.times = late.times.iter().map(|t| *t + Duration::hours(3)).collect();

        let merged = merge_along_time(vec![late, early]).unwrap();
        assert_eq!(merged.times, times(7));
        let u = merged.field("U10").unwrap();
        assert_eq!(u.shape(), &[7, 1, 1]);
        assert_eq!(u[[3, 0, 0]], 1.0);
        assert_eq!(u[[4, 0, 0]], 2.0);
        assert!(normalize(&merged, &names()).is_ok());
    }

    #[test]
    fn test_merge_orders_by_time() {
        let lat = Array::from(vec![1.0]).into_dyn();
        let lon = Array::from(vec![4.0]).into_dyn();
        let early = dataset(lat.clone(), lon.clone(), Array3::from_elem((2, 1, 1), 1.0).into_dyn(), 2);
        let mut late = dataset(lat, lon, Array3::from_elem((2, 1, 1), 2.0).into_dyn(), 2);
        late.times = late.times.iter().map(|t| *t + Duration::hours(2)).collect();

        let merged = merge_along_time(vec![late, early]).unwrap();
        assert_eq!(merged.times.len(), 4);
        let u = merged.field("U10").unwrap();
        assert_eq!(u.shape(), &[4, 1, 1]);
        assert_eq!(u[[0, 0, 0]], 1.0);
        assert_eq!(u[[3, 0, 0]], 2.0);
    }
}
