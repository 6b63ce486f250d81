//! Subcommand implementations, generic over the datastore.

use anyhow::{Context, Result};
use forecast_common::{BoundingBox, Domain, TableKind, TimeRange};
use ingestion::{purge, EtlPipeline, PurgeTarget};
use serde::Serialize;
use station_query::{QueryService, StationLookup};
use std::path::PathBuf;
use storage::{Datastore, Observation, WaveObservation, WindObservation};
use tracing::info;

use crate::config_loader::ServiceConfig;

/// A parsed request to the ingester.
#[derive(Debug, Clone)]
pub enum Request {
    Migrate,
    Wind { files: Vec<PathBuf> },
    Wave { tab01: PathBuf, tab41: PathBuf },
    Purge { domain: Domain, target: PurgeTarget },
    Station {
        domain: Domain,
        kind: TableKind,
        lookup: StationLookup,
        range: TimeRange,
    },
    Bbox {
        domain: Domain,
        kind: TableKind,
        bbox: BoundingBox,
        range: TimeRange,
    },
}

/// Run one request and return what should be printed to stdout.
pub async fn execute<S: Datastore>(store: S, config: &ServiceConfig, request: Request) -> Result<String> {
    match request {
        Request::Migrate => {
            store.migrate().await.context("Migration failed")?;
            Ok("Schema is up to date".to_string())
        }
        Request::Wind { files } => {
            let pipeline = EtlPipeline::new(store, config.etl.clone())?;
            let report = pipeline
                .run_wind_files(&files)
                .await
                .with_context(|| format!("Wind cycle failed for {:?}", files))?;
            Ok(report.to_string())
        }
        Request::Wave { tab01, tab41 } => {
            let pipeline = EtlPipeline::new(store, config.etl.clone())?;
            let report = pipeline
                .run_wave_files(&tab01, &tab41)
                .await
                .with_context(|| format!("Wave cycle failed for {:?} + {:?}", tab01, tab41))?;
            Ok(report.to_string())
        }
        Request::Purge { domain, target } => {
            let removed = purge(&store, domain, target)
                .await
                .with_context(|| format!("Purge of {} {:?} failed", domain, target))?;
            Ok(format!("Removed {} rows", removed))
        }
        Request::Station {
            domain,
            kind,
            lookup,
            range,
        } => {
            let service = QueryService::new(store, config.query);
            match domain {
                Domain::Wind => {
                    station_json::<WindObservation, S>(&service, domain, kind, &lookup, &range).await
                }
                Domain::Wave => {
                    station_json::<WaveObservation, S>(&service, domain, kind, &lookup, &range).await
                }
            }
        }
        Request::Bbox {
            domain,
            kind,
            bbox,
            range,
        } => {
            let service = QueryService::new(store, config.query);
            match domain {
                Domain::Wind => {
                    bbox_json::<WindObservation, S>(&service, domain, kind, &bbox, &range).await
                }
                Domain::Wave => {
                    bbox_json::<WaveObservation, S>(&service, domain, kind, &bbox, &range).await
                }
            }
        }
    }
}

async fn station_json<T: Observation, S: Datastore>(
    service: &QueryService<S>,
    domain: Domain,
    kind: TableKind,
    lookup: &StationLookup,
    range: &TimeRange,
) -> Result<String> {
    let rows = service.by_station::<T>(domain, kind, lookup, range).await?;
    info!(rows = rows.len(), "Station query complete");
    to_json(&rows)
}

async fn bbox_json<T: Observation, S: Datastore>(
    service: &QueryService<S>,
    domain: Domain,
    kind: TableKind,
    bbox: &BoundingBox,
    range: &TimeRange,
) -> Result<String> {
    let rows = service.by_bbox::<T>(domain, kind, bbox, range).await?;
    info!(rows = rows.len(), "Bounding box query complete");
    to_json(&rows)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize query result")
}
