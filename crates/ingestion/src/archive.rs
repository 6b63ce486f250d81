//! Archive window selection.

use chrono::{DateTime, Duration, Utc};
use storage::Observation;

use crate::config::ArchiveBound;

/// Last timestamp of the archive window, `min(times) + window`.
pub fn archive_cutoff<I>(times: I, window: Duration) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    times.into_iter().min().map(|first| first + window)
}

/// Rows falling in the first `window` of the cycle, in input order.
pub fn select_archive<T: Observation>(rows: &[T], window: Duration, bound: ArchiveBound) -> Vec<T> {
    let Some(cutoff) = archive_cutoff(rows.iter().map(|r| r.forecast_time()), window) else {
        return Vec::new();
    };
    rows.iter()
        .filter(|r| match bound {
            ArchiveBound::Inclusive => r.forecast_time() <= cutoff,
            ArchiveBound::Exclusive => r.forecast_time() < cutoff,
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use storage::WaveObservation;

    fn hourly(hours: i64) -> Vec<WaveObservation> {
        let base = Utc.with_ymd_and_hms(2025, 8, 10, 0, 0, 0).unwrap();
        (0..hours)
            .map(|h| WaveObservation {
                station_id: 1,
                forecast_time: base + Duration::hours(h),
                tp: 0.0,
                hs: 0.0,
                hmax: 0.0,
                tz: 0.0,
                wave_direction: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_inclusive_window_keeps_boundary_hour() {
        let rows = hourly(14);
        let archive = select_archive(&rows, Duration::hours(11), ArchiveBound::Inclusive);
        assert_eq!(rows.len(), 14);
        assert_eq!(archive.len(), 12);
        assert_eq!(archive.last().unwrap().forecast_time, rows[11].forecast_time);
    }

    #[test]
    fn test_exclusive_window_drops_boundary_hour() {
        let rows = hourly(14);
        let archive = select_archive(&rows, Duration::hours(11), ArchiveBound::Exclusive);
        assert_eq!(archive.len(), 11);
    }

    #[test]
    fn test_empty_rows() {
        let rows: Vec<WaveObservation> = Vec::new();
        assert!(select_archive(&rows, Duration::hours(11), ArchiveBound::Inclusive).is_empty());
    }
}
