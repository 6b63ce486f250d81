//! Ready-made datasets and input files for ETL tests.

use grid_source::GriddedDataset;
use ndarray::Array3;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::generators::{axis, constant_field, hourly, indexed_field, meshgrid};

/// Common bounding boxes as `(min_lat, max_lat, min_lon, max_lon)`.
pub mod bbox {
    /// The Arabian Gulf model domain.
    pub const GULF: (f64, f64, f64, f64) = (22.0, 30.5, 47.5, 57.0);

    /// Open water with no model cells.
    pub const EMPTY_OCEAN: (f64, f64, f64, f64) = (-40.0, -39.0, -10.0, -9.0);

    /// Spans more than the default query limit.
    pub const OVERSIZED: (f64, f64, f64, f64) = (-60.0, 60.0, -90.0, 90.0);
}

/// Rectilinear wind grid with 2-D coordinate meshes.
///
/// Latitudes start at 24.0 in 0.5 degree steps, longitudes at 54.0 in 0.5
/// degree steps. `U10 = 3`, `V10 = 4` everywhere (so wind speed is 5) and
/// `T2` is [`indexed_field`].
pub fn rectilinear_wind_dataset(ny: usize, nx: usize, hours: usize) -> GriddedDataset {
    let (lat, lon) = meshgrid(&axis(24.0, 0.5, ny), &axis(54.0, 0.5, nx));
    let mut fields = BTreeMap::new();
    fields.insert("U10".to_string(), constant_field(hours, ny, nx, 3.0));
    fields.insert("V10".to_string(), constant_field(hours, ny, nx, 4.0));
    fields.insert("T2".to_string(), indexed_field(hours, ny, nx));

    GriddedDataset {
        source: format!("rectilinear_{}x{}.nc", ny, nx),
        lat: lat.into_dyn(),
        lon: lon.into_dyn(),
        times: hourly(hours),
        fields,
    }
}

/// Curvilinear wind grid: rows are sheared eastward so neither coordinate
/// is constant along an axis. Coordinates carry a leading time axis of
/// length 1.
pub fn curvilinear_wind_dataset(ny: usize, nx: usize, hours: usize) -> GriddedDataset {
    let lat = Array3::from_shape_fn((1, ny, nx), |(_, y, x)| 24.0 + 0.5 * y as f64 + 0.1 * x as f64);
    let lon = Array3::from_shape_fn((1, ny, nx), |(_, y, x)| 54.0 + 0.5 * x as f64 + 0.2 * y as f64);
    let mut fields = BTreeMap::new();
    fields.insert("U10".to_string(), constant_field(hours, ny, nx, -3.0));
    fields.insert("V10".to_string(), constant_field(hours, ny, nx, -4.0));
    fields.insert("T2".to_string(), indexed_field(hours, ny, nx));

    GriddedDataset {
        source: format!("curvilinear_{}x{}.nc", ny, nx),
        lat: lat.into_dyn(),
        lon: lon.into_dyn(),
        times: hourly(hours),
        fields,
    }
}

/// Contents of a paired `tab01` / `tab41` export for `points` stations over
/// `hours` hourly steps, units row included.
///
/// Station `p` sits at `(25.0 + p, 52.0 + p)` with `Hs = 1 + p`.
pub fn wave_tables(points: usize, hours: usize) -> (String, String) {
    let mut tab01 = String::from("Time,Long,Lat,Tp\n[],[deg],[deg],[s]\n");
    let mut tab41 = String::from("Time,Long,Lat,Hs,Tr,Dir\n[],[deg],[deg],[m],[s],[deg]\n");
    for time in hourly(hours) {
        let stamp = time.format("%Y/%m/%d %H:%M:%S");
        for p in 0..points {
            let (lat, lon) = (25.0 + p as f64, 52.0 + p as f64);
            tab01.push_str(&format!("{},{:.4},{:.4},{:.1}\n", stamp, lon, lat, 7.0 + p as f64));
            tab41.push_str(&format!(
                "{},{:.4},{:.4},{:.1},{:.1},{:.1}\n",
                stamp,
                lon,
                lat,
                1.0 + p as f64,
                5.0,
                300.0
            ));
        }
    }
    (tab01, tab41)
}

/// Write [`wave_tables`] into `dir`, returning the two paths.
pub fn write_wave_tables(dir: &Path, points: usize, hours: usize) -> std::io::Result<(PathBuf, PathBuf)> {
    let (tab01, tab41) = wave_tables(points, hours);
    let tab01_path = dir.join("tab01.csv");
    let tab41_path = dir.join("tab41.csv");
    std::fs::write(&tab01_path, tab01)?;
    std::fs::write(&tab41_path, tab41)?;
    Ok((tab01_path, tab41_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectilinear_shapes() {
        let ds = rectilinear_wind_dataset(2, 3, 4);
        assert_eq!(ds.lat.shape(), &[2, 3]);
        assert_eq!(ds.field("T2").unwrap().shape(), &[4, 2, 3]);
        assert_eq!(ds.times.len(), 4);
    }

    #[test]
    fn test_curvilinear_has_leading_axis() {
        let ds = curvilinear_wind_dataset(2, 2, 1);
        assert_eq!(ds.lon.shape(), &[1, 2, 2]);
        assert_ne!(ds.lon[[0, 0, 0]], ds.lon[[0, 1, 0]]);
    }

    #[test]
    fn test_wave_tables_line_count() {
        let (tab01, tab41) = wave_tables(2, 3);
        // header + units + rows
        assert_eq!(tab01.lines().count(), 2 + 6);
        assert_eq!(tab41.lines().count(), 2 + 6);
    }
}
