//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};
use crate::geo::GeoPoint;

/// A lat/lon bounding box in degrees. Containment is boundary-inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Create a bounding box, rejecting inverted or non-finite corners.
    pub fn checked(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> ForecastResult<Self> {
        let bbox = Self::new(min_lat, max_lat, min_lon, max_lon);
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> ForecastResult<()> {
        let corners = [self.min_lat, self.max_lat, self.min_lon, self.max_lon];
        if corners.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidBbox("non-finite corner".to_string()));
        }
        if self.min_lat > self.max_lat {
            return Err(ForecastError::InvalidBbox(format!(
                "min_lat {} > max_lat {}",
                self.min_lat, self.max_lat
            )));
        }
        if self.min_lon > self.max_lon {
            return Err(ForecastError::InvalidBbox(format!(
                "min_lon {} > max_lon {}",
                self.min_lon, self.max_lon
            )));
        }
        Ok(())
    }

    /// Latitude extent in degrees.
    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Longitude extent in degrees.
    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lat [{}, {}] lon [{}, {}]",
            self.min_lat, self.max_lat, self.min_lon, self.max_lon
        )
    }
}
