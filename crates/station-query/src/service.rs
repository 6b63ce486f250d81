//! Station and bounding-box time series lookups.

use forecast_common::{BoundingBox, Domain, GeoPoint, TableKind, TimeRange};
use serde::Serialize;
use std::collections::HashMap;
use storage::{Datastore, Observation, Station};
use tracing::{debug, instrument};

use crate::error::{QueryError, Result};
use crate::limits::QueryLimits;

/// How a single station is chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum StationLookup {
    /// Exact station name.
    Name(String),
    /// Nearest station to a point; ties go to the lowest id.
    Point(GeoPoint),
}

impl StationLookup {
    /// Build a lookup from optional request parameters. Exactly one of a
    /// name or a complete `lat`/`lon` pair must be given.
    pub fn from_parts(name: Option<String>, lat: Option<f64>, lon: Option<f64>) -> Result<Self> {
        match (name, lat, lon) {
            (Some(name), None, None) => {
                if name.trim().is_empty() {
                    return Err(QueryError::InvalidRequest("station name is empty".to_string()));
                }
                Ok(StationLookup::Name(name))
            }
            (None, Some(lat), Some(lon)) => Ok(StationLookup::Point(GeoPoint::checked(lat, lon)?)),
            (None, None, None) => Err(QueryError::InvalidRequest(
                "either a station name or lat and lon is required".to_string(),
            )),
            (None, _, _) => Err(QueryError::InvalidRequest(
                "lat and lon must be given together".to_string(),
            )),
            (Some(_), _, _) => Err(QueryError::InvalidRequest(
                "station name and lat/lon are mutually exclusive".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for StationLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StationLookup::Name(name) => write!(f, "name '{}'", name),
            StationLookup::Point(point) => write!(f, "nearest to {}", point),
        }
    }
}

/// An observation row with its station's name and location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedObservation<T> {
    pub station_name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(flatten)]
    pub observation: T,
}

impl<T> EnrichedObservation<T> {
    fn new(station: &Station, observation: T) -> Self {
        Self {
            station_name: station.name.clone(),
            lat: station.lat,
            lon: station.lon,
            observation,
        }
    }
}

/// Read-side queries over one datastore.
pub struct QueryService<S> {
    store: S,
    limits: QueryLimits,
}

impl<S: Datastore> QueryService<S> {
    pub fn new(store: S, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve a single station.
    pub async fn station(&self, domain: Domain, lookup: &StationLookup) -> Result<Station> {
        let table = domain.tables().stations;
        let found = match lookup {
            StationLookup::Name(name) => self.store.station_by_name(&table, name).await?,
            StationLookup::Point(point) => self.store.nearest_station(&table, *point).await?,
        };
        found.ok_or_else(|| QueryError::StationNotFound(format!("{} station with {}", domain, lookup)))
    }

    /// Rows of one station within `range`, ordered by time.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn by_station<T: Observation>(
        &self,
        domain: Domain,
        kind: TableKind,
        lookup: &StationLookup,
        range: &TimeRange,
    ) -> Result<Vec<EnrichedObservation<T>>> {
        check_domain::<T>(domain)?;
        let station = self.station(domain, lookup).await?;
        debug!(station = %station.name, id = station.id, "Station resolved");

        let tables = domain.tables();
        let rows: Vec<T> = self
            .store
            .fetch_rows(tables.observations(kind), &[station.id], range)
            .await?;
        if rows.is_empty() {
            return Err(no_rows(&station.name, range));
        }
        self.limits.check_rows(rows.len())?;

        Ok(rows
            .into_iter()
            .map(|row| EnrichedObservation::new(&station, row))
            .collect())
    }

    /// Rows of every station inside `bbox` within `range`, ordered by station
    /// then time.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn by_bbox<T: Observation>(
        &self,
        domain: Domain,
        kind: TableKind,
        bbox: &BoundingBox,
        range: &TimeRange,
    ) -> Result<Vec<EnrichedObservation<T>>> {
        check_domain::<T>(domain)?;
        bbox.validate()?;
        self.limits.check_bbox(bbox)?;

        let tables = domain.tables();
        let stations = self.store.stations_in_bbox(&tables.stations, bbox).await?;
        if stations.is_empty() {
            return Err(QueryError::NoStationsInBox(bbox.to_string()));
        }
        debug!(stations = stations.len(), "Stations in box");

        let ids: Vec<i64> = stations.iter().map(|s| s.id).collect();
        let rows: Vec<T> = self
            .store
            .fetch_rows(tables.observations(kind), &ids, range)
            .await?;
        if rows.is_empty() {
            return Err(no_rows(&format!("{} stations", stations.len()), range));
        }
        self.limits.check_rows(rows.len())?;

        let by_id: HashMap<i64, &Station> = stations.iter().map(|s| (s.id, s)).collect();
        rows.into_iter()
            .map(|row| {
                let station = by_id.get(&row.station_id()).ok_or_else(|| {
                    QueryError::InvalidRequest(format!(
                        "row references station {} outside the box",
                        row.station_id()
                    ))
                })?;
                Ok(EnrichedObservation::new(station, row))
            })
            .collect()
    }
}

fn check_domain<T: Observation>(domain: Domain) -> Result<()> {
    if T::DOMAIN != domain {
        return Err(QueryError::InvalidRequest(format!(
            "{} rows requested from the {} domain",
            T::DOMAIN,
            domain
        )));
    }
    Ok(())
}

fn no_rows(stations: &str, range: &TimeRange) -> QueryError {
    QueryError::NoRowsInRange {
        stations: stations.to_string(),
        start: range.start.to_rfc3339(),
        end: range.end.to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_from_parts() {
        assert_eq!(
            StationLookup::from_parts(Some("wave_station_1".into()), None, None).unwrap(),
            StationLookup::Name("wave_station_1".into())
        );
        assert!(matches!(
            StationLookup::from_parts(None, Some(24.0), Some(54.0)).unwrap(),
            StationLookup::Point(_)
        ));
        assert!(StationLookup::from_parts(None, Some(24.0), None).is_err());
        assert!(StationLookup::from_parts(Some("a".into()), Some(1.0), Some(1.0)).is_err());
        assert!(StationLookup::from_parts(None, None, None).is_err());
        assert!(StationLookup::from_parts(None, Some(91.0), Some(0.0)).is_err());
    }
}
