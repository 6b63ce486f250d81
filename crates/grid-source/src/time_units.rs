//! CF-convention time axis decoding (`"<unit> since <epoch>"`).

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use forecast_common::parse_timestamp;

use crate::error::{SourceError, SourceResult};

/// A parsed `units` attribute of a numeric time variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    /// Length of one unit in milliseconds.
    unit_ms: i64,
    epoch: DateTime<Utc>,
}

impl TimeUnits {
    pub fn parse(units: &str) -> SourceResult<Self> {
        let invalid = || SourceError::invalid("time units", format!("unrecognised '{}'", units));

        let (unit, epoch) = units.split_once(" since ").ok_or_else(invalid)?;
        let unit_ms = match unit.trim().to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => 86_400_000,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3_600_000,
            "minutes" | "minute" | "mins" | "min" => 60_000,
            "seconds" | "second" | "secs" | "sec" | "s" => 1_000,
            _ => return Err(invalid()),
        };

        let epoch = parse_epoch(epoch.trim()).ok_or_else(invalid)?;
        Ok(Self { unit_ms, epoch })
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Convert one axis value. Non-finite values and offsets outside the
    /// representable date range yield `None`.
    pub fn to_datetime(&self, value: f64) -> Option<DateTime<Utc>> {
        if !value.is_finite() {
            return None;
        }
        let offset_ms = (value * self.unit_ms as f64).round() as i64;
        self.epoch
            .checked_add_signed(Duration::try_milliseconds(offset_ms)?)
    }
}

fn parse_epoch(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim_end_matches(" UTC").trim();
    if let Ok(dt) = parse_timestamp(s) {
        return Some(dt);
    }
    ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}
