//! Geographic points and fixed-precision coordinate keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ForecastError, ForecastResult};

/// Spatial reference id of every persisted point (WGS84 lat/lon).
pub const SRID_WGS84: i32 = 4326;

/// Number of decimal digits coordinates are compared at.
pub const DEFAULT_COORDINATE_PRECISION: u32 = 4;

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A WGS84 point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Create a point, rejecting non-finite or out-of-range coordinates.
    pub fn checked(lat: f64, lon: f64) -> ForecastResult<Self> {
        if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 360.0 {
            return Err(ForecastError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Great-circle distance to another point in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }

    /// Key of this point at the given precision.
    pub fn key(&self, precision: u32) -> Option<CoordKey> {
        CoordKey::new(self.lat, self.lon, precision)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// A (lat, lon) pair rounded to a fixed number of decimal digits and stored
/// as scaled integers, so it can be hashed and compared exactly.
///
/// Rounding is half away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey {
    lat: i64,
    lon: i64,
    precision: u32,
}

impl CoordKey {
    /// Returns `None` for NaN or infinite coordinates.
    pub fn new(lat: f64, lon: f64, precision: u32) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        let scale = 10f64.powi(precision as i32);
        Some(Self {
            lat: (lat * scale).round() as i64,
            lon: (lon * scale).round() as i64,
            precision,
        })
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// The rounded point this key represents.
    pub fn to_point(&self) -> GeoPoint {
        let scale = 10f64.powi(self.precision as i32);
        GeoPoint::new(self.lat as f64 / scale, self.lon as f64 / scale)
    }
}

impl fmt::Display for CoordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.to_point();
        let digits = self.precision as usize;
        write!(f, "({:.*}, {:.*})", digits, p.lat, digits, p.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_rounds_to_precision() {
        let a = CoordKey::new(24.56781, 54.12344, 4).unwrap();
        let b = CoordKey::new(24.56779, 54.12336, 4).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "(24.5678, 54.1234)");
    }

    #[test]
    fn test_key_distinguishes_neighbours() {
        let a = CoordKey::new(24.5678, 54.1234, 4).unwrap();
        let b = CoordKey::new(24.5679, 54.1234, 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_rejects_nan() {
        assert!(CoordKey::new(f64::NAN, 1.0, 4).is_none());
        assert!(CoordKey::new(1.0, f64::INFINITY, 4).is_none());
    }

    #[test]
    fn test_negative_rounding_is_symmetric() {
        let pos = CoordKey::new(10.00005, 20.0, 4).unwrap();
        let neg = CoordKey::new(-10.00005, -20.0, 4).unwrap();
        assert_eq!(pos.to_point().lat, -neg.to_point().lat);
    }

    #[test]
    fn test_distance() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 1.0);
        // One degree of longitude at the equator
        assert!((a.distance_km(&b) - 111.195).abs() < 0.01);
        assert_eq!(a.distance_km(&a), 0.0);
    }

    #[test]
    fn test_checked_point() {
        assert!(GeoPoint::checked(91.0, 0.0).is_err());
        assert!(GeoPoint::checked(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::checked(45.0, -120.0).is_ok());
    }
}
