//! Time handling for forecast timestamps and query ranges.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};

/// Timestamp layout used in bulk-copy buffers.
pub const COPY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a timestamp given as RFC 3339, `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM:SS` or a bare date. Naive values are taken as UTC.
pub fn parse_timestamp(s: &str) -> ForecastResult<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", COPY_TIMESTAMP_FORMAT] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(ForecastError::InvalidTime(s.to_string()))
}

/// An inclusive time range for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> ForecastResult<Self> {
        if start > end {
            return Err(ForecastError::InvalidTimeRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse both bounds with [`parse_timestamp`].
    pub fn parse(start: &str, end: &str) -> ForecastResult<Self> {
        Self::new(parse_timestamp(start)?, parse_timestamp(end)?)
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 8, 10, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-08-10T12:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-08-10T12:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-08-10 12:00:00").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2025-08-10").unwrap(),
            expected - Duration::hours(12)
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_range_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2025, 8, 10, 0, 0, 0).unwrap();
        let end = start + Duration::hours(6);
        let range = TimeRange::new(start, end).unwrap();
        assert!(range.contains(&start));
        assert!(range.contains(&end));
        assert!(!range.contains(&(end + Duration::seconds(1))));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(TimeRange::parse("2025-08-11", "2025-08-10").is_err());
    }
}
