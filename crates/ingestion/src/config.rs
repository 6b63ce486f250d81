//! Pipeline configuration.
//!
//! One [`EtlConfig`] is passed into each cycle. It is read from YAML, then
//! selected values may be overridden from the environment.

use chrono::Duration;
use forecast_common::{Domain, SRID_WGS84};
use grid_source::{GriddedVariables, TabularOptions};
use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, Result};

/// Environment variable names read by [`EtlConfig::apply_env`].
pub mod env_vars {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const CHUNK_SIZE: &str = "ETL_CHUNK_SIZE";
    pub const WIND_ARCHIVE_HOURS: &str = "ETL_WIND_ARCHIVE_HOURS";
    pub const WAVE_ARCHIVE_HOURS: &str = "ETL_WAVE_ARCHIVE_HOURS";
}

/// Whether the archive window includes its end timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveBound {
    #[default]
    Inclusive,
    Exclusive,
}

/// Archive window length in hours after the first forecast time, per domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveWindows {
    pub wind: i64,
    pub wave: i64,
}

impl Default for ArchiveWindows {
    fn default() -> Self {
        Self { wind: 12, wave: 11 }
    }
}

impl ArchiveWindows {
    pub fn hours(&self, domain: Domain) -> i64 {
        match domain {
            Domain::Wind => self.wind,
            Domain::Wave => self.wave,
        }
    }
}

/// NetCDF variable names for the wind domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindVariables {
    pub lat: String,
    pub lon: String,
    pub time: String,
    pub u10: String,
    pub v10: String,
    pub temperature: String,
}

impl Default for WindVariables {
    fn default() -> Self {
        Self {
            lat: "XLAT".to_string(),
            lon: "XLONG".to_string(),
            time: "XTIME".to_string(),
            u10: "U10".to_string(),
            v10: "V10".to_string(),
            temperature: "T2".to_string(),
        }
    }
}

impl WindVariables {
    pub fn to_gridded(&self) -> GriddedVariables {
        GriddedVariables {
            lat: self.lat.clone(),
            lon: self.lon.clone(),
            time: self.time.clone(),
            fields: vec![
                self.u10.clone(),
                self.v10.clone(),
                self.temperature.clone(),
            ],
        }
    }
}

/// Configuration for ETL cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Rows per bulk-copy chunk.
    pub chunk_size: usize,
    /// Stations per insert batch.
    pub station_batch: usize,
    /// Decimal digits coordinates are rounded to before comparison.
    pub coordinate_precision: u32,
    pub archive_window_hours: ArchiveWindows,
    pub archive_bound: ArchiveBound,
    pub srid: i32,
    /// Create secondary indexes after loading.
    pub maintain_indexes: bool,
    /// Re-cluster observation tables after loading. Independent of
    /// `maintain_indexes`; the clustering index is created when missing.
    pub cluster_after_load: bool,
    pub wind: WindVariables,
    pub wave: TabularOptions,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
            chunk_size: 500_000,
            station_batch: 10_000,
            coordinate_precision: 4,
            archive_window_hours: ArchiveWindows::default(),
            archive_bound: ArchiveBound::Inclusive,
            srid: SRID_WGS84,
            maintain_indexes: true,
            cluster_after_load: true,
            wind: WindVariables::default(),
            wave: TabularOptions::default(),
        }
    }
}

impl EtlConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| IngestionError::InvalidConfig(e.to_string()))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(env_vars::DATABASE_URL) {
            self.database_url = Some(url);
        }
        if let Some(value) = lookup(env_vars::CHUNK_SIZE) {
            self.chunk_size = parse_override(env_vars::CHUNK_SIZE, &value)?;
        }
        if let Some(value) = lookup(env_vars::WIND_ARCHIVE_HOURS) {
            self.archive_window_hours.wind = parse_override(env_vars::WIND_ARCHIVE_HOURS, &value)?;
        }
        if let Some(value) = lookup(env_vars::WAVE_ARCHIVE_HOURS) {
            self.archive_window_hours.wave = parse_override(env_vars::WAVE_ARCHIVE_HOURS, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(IngestionError::InvalidConfig(msg));

        if self.chunk_size == 0 {
            return invalid("chunk_size must be positive".to_string());
        }
        if self.station_batch == 0 {
            return invalid("station_batch must be positive".to_string());
        }
        if self.coordinate_precision > 9 {
            return invalid(format!(
                "coordinate_precision {} exceeds 9 decimal digits",
                self.coordinate_precision
            ));
        }
        for domain in [Domain::Wind, Domain::Wave] {
            let hours = self.archive_window_hours.hours(domain);
            if hours < 0 {
                return invalid(format!(
                    "archive_window_hours.{} must not be negative (got {})",
                    domain, hours
                ));
            }
        }
        if self.srid != SRID_WGS84 {
            return invalid(format!("only SRID {} is supported (got {})", SRID_WGS84, self.srid));
        }
        if self.max_connections == 0 {
            return invalid("max_connections must be positive".to_string());
        }
        Ok(())
    }

    pub fn archive_window(&self, domain: Domain) -> Duration {
        Duration::hours(self.archive_window_hours.hours(domain))
    }

    /// Wave reader options, matched at the configured precision.
    pub fn wave_options(&self) -> TabularOptions {
        TabularOptions {
            precision: self.coordinate_precision,
            ..self.wave.clone()
        }
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| IngestionError::InvalidConfig(format!("{}={} is not a valid number", key, value)))
}
