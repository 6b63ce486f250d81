//! Request limits.

use forecast_common::BoundingBox;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// Caps applied before and after hitting the store. `None` disables a cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Largest latitude or longitude span of a bounding box, in degrees.
    pub max_bbox_degrees: Option<f64>,

    /// Most rows a single query may return.
    pub max_rows: Option<usize>,
}

impl QueryLimits {
    pub fn check_bbox(&self, bbox: &BoundingBox) -> Result<()> {
        if let Some(limit) = self.max_bbox_degrees {
            let span = bbox.lat_span().max(bbox.lon_span());
            if span > limit {
                return Err(QueryError::LimitExceeded(format!(
                    "bounding box spans {:.3} degrees, limit is {}",
                    span, limit
                )));
            }
        }
        Ok(())
    }

    pub fn check_rows(&self, rows: usize) -> Result<()> {
        match self.max_rows {
            Some(limit) if rows > limit => Err(QueryError::LimitExceeded(format!(
                "{} rows matched, limit is {}",
                rows, limit
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_by_default() {
        let limits = QueryLimits::default();
        assert!(limits.check_bbox(&BoundingBox::new(-90.0, 90.0, -180.0, 180.0)).is_ok());
        assert!(limits.check_rows(usize::MAX).is_ok());
    }

    #[test]
    fn test_bbox_span_limit() {
        let limits = QueryLimits {
            max_bbox_degrees: Some(0.5),
            ..QueryLimits::default()
        };
        assert!(limits.check_bbox(&BoundingBox::new(24.0, 24.5, 54.0, 54.5)).is_ok());
        assert!(limits.check_bbox(&BoundingBox::new(24.0, 24.5, 54.0, 54.6)).is_err());
    }

    #[test]
    fn test_row_limit() {
        let limits = QueryLimits {
            max_rows: Some(10),
            ..QueryLimits::default()
        };
        assert!(limits.check_rows(10).is_ok());
        assert!(matches!(limits.check_rows(11), Err(QueryError::LimitExceeded(_))));
    }
}
