//! Typed rows persisted by the datastore.

use chrono::{DateTime, Utc};
use forecast_common::{CoordKey, Domain, GeoPoint};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::FromRow;

/// A persisted station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Station {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Station {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    pub fn key(&self, precision: u32) -> Option<CoordKey> {
        CoordKey::new(self.lat, self.lon, precision)
    }
}

/// A station about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStation {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    pub description: String,
}

impl NewStation {
    /// Station placed at a rounded coordinate, named after its domain.
    pub fn at(domain: Domain, id: i64, key: &CoordKey) -> Self {
        let point = key.to_point();
        Self {
            id,
            lat: point.lat,
            lon: point.lon,
            name: domain.station_name(id),
            description: String::new(),
        }
    }
}

/// A row of an observation table (forecast or archive).
///
/// `COLUMNS` is both the bulk-copy header and the select list, so serde field
/// order must match it.
pub trait Observation:
    Serialize + DeserializeOwned + for<'r> FromRow<'r, PgRow> + Clone + Send + Sync + Unpin + 'static
{
    const DOMAIN: Domain;
    const COLUMNS: &'static [&'static str];

    fn station_id(&self) -> i64;
    fn forecast_time(&self) -> DateTime<Utc>;
}

/// All columns of a domain's observation tables, keys first.
pub fn observation_columns(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::Wind => WindObservation::COLUMNS,
        Domain::Wave => WaveObservation::COLUMNS,
    }
}

/// Physical columns of a domain's observation tables.
pub fn value_columns(domain: Domain) -> &'static [&'static str] {
    &observation_columns(domain)[2..]
}

/// Derived 10m/50m wind and 2m temperature for one station and hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WindObservation {
    pub station_id: i64,
    #[serde(with = "copy_time")]
    pub forecast_time: DateTime<Utc>,
    pub temperature: f64,
    pub ws10: f64,
    pub wind_direction: f64,
    pub wg10: f64,
    pub ws50: f64,
    pub wg50: f64,
}

impl Observation for WindObservation {
    const DOMAIN: Domain = Domain::Wind;
    const COLUMNS: &'static [&'static str] = &[
        "station_id",
        "forecast_time",
        "temperature",
        "ws10",
        "wind_direction",
        "wg10",
        "ws50",
        "wg50",
    ];

    fn station_id(&self) -> i64 {
        self.station_id
    }

    fn forecast_time(&self) -> DateTime<Utc> {
        self.forecast_time
    }
}

/// Wave period, height and direction for one station and hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WaveObservation {
    pub station_id: i64,
    #[serde(with = "copy_time")]
    pub forecast_time: DateTime<Utc>,
    pub tp: f64,
    pub hs: f64,
    pub hmax: f64,
    pub tz: f64,
    pub wave_direction: f64,
}

impl Observation for WaveObservation {
    const DOMAIN: Domain = Domain::Wave;
    const COLUMNS: &'static [&'static str] = &[
        "station_id",
        "forecast_time",
        "tp",
        "hs",
        "hmax",
        "tz",
        "wave_direction",
    ];

    fn station_id(&self) -> i64 {
        self.station_id
    }

    fn forecast_time(&self) -> DateTime<Utc> {
        self.forecast_time
    }
}

/// Serde adapter for the `YYYY-MM-DD HH:MM:SS` (UTC) copy format.
pub mod copy_time {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use forecast_common::COPY_TIMESTAMP_FORMAT;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&dt.format(COPY_TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, COPY_TIMESTAMP_FORMAT)
            .map(|ndt| Utc.from_utc_datetime(&ndt))
            .map_err(serde::de::Error::custom)
    }
}
