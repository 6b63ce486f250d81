//! Synthetic coordinate axes, time axes and field arrays.
//!
//! Values follow simple closed-form patterns so tests can predict any cell.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ndarray::{Array1, Array2, Array3, ArrayD};

/// Start of every synthetic cycle: 2025-08-10 00:00:00 UTC.
pub fn cycle_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 10, 0, 0, 0)
        .single()
        .expect("valid fixed timestamp")
}

/// `count` timestamps `step_hours` apart, starting at `start`.
pub fn time_axis(start: DateTime<Utc>, count: usize, step_hours: i64) -> Vec<DateTime<Utc>> {
    (0..count as i64)
        .map(|i| start + Duration::hours(i * step_hours))
        .collect()
}

/// Hourly timestamps from [`cycle_start`].
pub fn hourly(count: usize) -> Vec<DateTime<Utc>> {
    time_axis(cycle_start(), count, 1)
}

/// `count` values starting at `start`, `step` apart.
pub fn axis(start: f64, step: f64, count: usize) -> Array1<f64> {
    Array1::from_iter((0..count).map(|i| start + step * i as f64))
}

/// 2-D latitude and longitude meshes `(y, x)` of a rectilinear grid.
pub fn meshgrid(lats: &Array1<f64>, lons: &Array1<f64>) -> (Array2<f64>, Array2<f64>) {
    let shape = (lats.len(), lons.len());
    let lat = Array2::from_shape_fn(shape, |(y, _)| lats[y]);
    let lon = Array2::from_shape_fn(shape, |(_, x)| lons[x]);
    (lat, lon)
}

/// A `(time, y, x)` field where every cell holds `value`.
pub fn constant_field(times: usize, ny: usize, nx: usize, value: f64) -> ArrayD<f64> {
    Array3::from_elem((times, ny, nx), value).into_dyn()
}

/// A `(time, y, x)` field holding `t * 100 + y * 10 + x`.
///
/// Any cell can be checked against its indices.
pub fn indexed_field(times: usize, ny: usize, nx: usize) -> ArrayD<f64> {
    Array3::from_shape_fn((times, ny, nx), |(t, y, x)| (t * 100 + y * 10 + x) as f64).into_dyn()
}
