//! Configuration loader for the ingester.
//!
//! One YAML file holds the ETL settings, query limits and logging defaults.
//! `${VAR}` and `${VAR:-default}` are substituted from the environment
//! before parsing, and the `DATABASE_URL` / `ETL_*` variables override the
//! parsed values.

use anyhow::{Context, Result};
use ingestion::EtlConfig;
use serde::{Deserialize, Serialize};
use station_query::QueryLimits;
use std::fs;
use std::path::Path;

// ============================================================================
// Service Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub etl: EtlConfig,
    pub query: QueryLimits,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
    /// Append log lines here instead of stderr.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}

// ============================================================================
// Loading Functions
// ============================================================================

/// Load the service config, or defaults when no file is given, then apply
/// environment overrides and validate.
pub fn load_service_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            parse_service_config(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?
        }
        None => ServiceConfig::default(),
    };

    config
        .etl
        .apply_env()
        .context("Invalid environment override")?;
    config.etl.validate().context("Invalid ETL configuration")?;
    validate_logging_config(&config.logging)?;

    Ok(config)
}

/// Parse YAML content after environment substitution.
pub fn parse_service_config(content: &str) -> Result<ServiceConfig> {
    let expanded = shellexpand::env(content).context("Environment variable substitution failed")?;
    let config: ServiceConfig =
        serde_yaml::from_str(&expanded).context("Failed to parse config YAML")?;
    Ok(config)
}

// ============================================================================
// Validation
// ============================================================================

fn validate_logging_config(config: &LoggingConfig) -> Result<()> {
    anyhow::ensure!(
        matches!(config.format.as_str(), "text" | "json"),
        "Logging format must be 'text' or 'json', got '{}'",
        config.format
    );
    Ok(())
}
