//! Forecast domains and the tables each one persists to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ForecastError;

/// The physical domain a cycle ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Gridded atmospheric model output (10m/50m wind, 2m temperature).
    Wind,
    /// Spectral wave model output (Tp, Hs, Hmax, Tz, direction).
    Wave,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Wind => "wind",
            Domain::Wave => "wave",
        }
    }

    pub fn tables(&self) -> TableSet {
        TableSet::for_domain(*self)
    }

    /// Display name minted for a new station.
    pub fn station_name(&self, id: i64) -> String {
        format!("{}_station_{}", self.as_str(), id)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wind" => Ok(Domain::Wind),
            "wave" => Ok(Domain::Wave),
            other => Err(ForecastError::UnknownDomain(other.to_string())),
        }
    }
}

/// Which observation table of a domain a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Forecast,
    Archive,
}

impl FromStr for TableKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forecast" | "forecasts" => Ok(TableKind::Forecast),
            "archive" => Ok(TableKind::Archive),
            other => Err(ForecastError::UnknownDomain(format!("table kind {}", other))),
        }
    }
}

/// Table and index names for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSet {
    pub domain: Domain,
    pub stations: String,
    pub forecasts: String,
    pub archive: String,
}

impl TableSet {
    pub fn for_domain(domain: Domain) -> Self {
        let prefix = domain.as_str();
        Self {
            domain,
            stations: format!("{}_stations", prefix),
            forecasts: format!("{}_forecasts", prefix),
            archive: format!("{}_archive", prefix),
        }
    }

    pub fn observations(&self, kind: TableKind) -> &str {
        match kind {
            TableKind::Forecast => &self.forecasts,
            TableKind::Archive => &self.archive,
        }
    }

    /// GiST index on the station location column.
    pub fn location_index(&self) -> String {
        format!("{}_station_location_gist", self.domain)
    }

    /// Index name for `column(s)` on an observation table.
    pub fn observation_index(&self, kind: TableKind, suffix: &str) -> String {
        let table = match kind {
            TableKind::Forecast => "forecast",
            TableKind::Archive => "archive",
        };
        format!("{}_{}_{}_idx", self.domain, table, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        let tables = Domain::Wave.tables();
        assert_eq!(tables.stations, "wave_stations");
        assert_eq!(tables.observations(TableKind::Forecast), "wave_forecasts");
        assert_eq!(tables.observations(TableKind::Archive), "wave_archive");
        assert_eq!(tables.location_index(), "wave_station_location_gist");
        assert_eq!(
            tables.observation_index(TableKind::Archive, "forecast_time"),
            "wave_archive_forecast_time_idx"
        );
    }

    #[test]
    fn test_parse_domain() {
        assert_eq!("Wind".parse::<Domain>().unwrap(), Domain::Wind);
        assert!("tide".parse::<Domain>().is_err());
        assert_eq!("archive".parse::<TableKind>().unwrap(), TableKind::Archive);
    }

    #[test]
    fn test_station_name() {
        assert_eq!(Domain::Wind.station_name(42), "wind_station_42");
    }
}
