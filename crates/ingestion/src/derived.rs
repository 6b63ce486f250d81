//! Derived physical quantities.
//!
//! Element-wise over whole arrays; NaN inputs give NaN outputs.

use ndarray::{Array, ArrayView, Dimension, Zip};

use crate::error::{IngestionError, Result};

/// Gust factor applied to sustained wind speed.
pub const GUST_FACTOR: f64 = 1.3;

/// Ratio of 50m to 10m wind speed.
pub const HEIGHT_50M_FACTOR: f64 = 1.1488;

/// Ratio of maximum to significant wave height.
pub const HMAX_FACTOR: f64 = 1.8;

/// Wind quantities derived from 10m `u`/`v` components.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedWind<D: Dimension> {
    pub ws10: Array<f64, D>,
    /// Meteorological direction the wind blows from, degrees in `[0, 360)`.
    pub direction: Array<f64, D>,
    pub wg10: Array<f64, D>,
    pub ws50: Array<f64, D>,
    pub wg50: Array<f64, D>,
}

fn check_shapes<D: Dimension>(u: &ArrayView<f64, D>, v: &ArrayView<f64, D>) -> Result<()> {
    if u.shape() != v.shape() {
        return Err(IngestionError::malformed(
            "derived quantities",
            format!("u shape {:?} differs from v shape {:?}", u.shape(), v.shape()),
        ));
    }
    Ok(())
}

pub fn wind_speed<D: Dimension>(u: ArrayView<f64, D>, v: ArrayView<f64, D>) -> Result<Array<f64, D>> {
    check_shapes(&u, &v)?;
    Ok(Zip::from(&u).and(&v).map_collect(|&u, &v| u.hypot(v)))
}

pub fn wind_direction<D: Dimension>(
    u: ArrayView<f64, D>,
    v: ArrayView<f64, D>,
) -> Result<Array<f64, D>> {
    check_shapes(&u, &v)?;
    Ok(Zip::from(&u)
        .and(&v)
        .map_collect(|&u, &v| compass_degrees((-u).atan2(-v).to_degrees())))
}

/// Fold an angle into `[0, 360)`. `rem_euclid` alone can round up to 360 for
/// tiny negative angles and keeps the sign of `-0.0`.
fn compass_degrees(angle: f64) -> f64 {
    let folded = angle.rem_euclid(360.0);
    if folded >= 360.0 {
        0.0
    } else {
        folded + 0.0
    }
}

pub fn derive_wind<D: Dimension>(u: ArrayView<f64, D>, v: ArrayView<f64, D>) -> Result<DerivedWind<D>> {
    let ws10 = wind_speed(u.view(), v.view())?;
    let direction = wind_direction(u, v)?;
    let wg10 = ws10.mapv(|s| s * GUST_FACTOR);
    let ws50 = ws10.mapv(|s| s * HEIGHT_50M_FACTOR);
    let wg50 = ws50.mapv(|s| s * GUST_FACTOR);
    Ok(DerivedWind {
        ws10,
        direction,
        wg10,
        ws50,
        wg50,
    })
}

pub fn max_wave_height<D: Dimension>(hs: ArrayView<f64, D>) -> Array<f64, D> {
    hs.mapv(|h| h * HMAX_FACTOR)
}
