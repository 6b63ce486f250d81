//! Query behaviour over a seeded in-memory store.

use chrono::{DateTime, Duration, Utc};
use forecast_common::{BoundingBox, Domain, GeoPoint, TableKind, TimeRange};
use station_query::{QueryError, QueryLimits, QueryService, StationLookup};
use storage::{Datastore, MemoryStore, NewStation, Observation, WaveObservation, WindObservation};
use test_utils::{bbox, cycle_start, hourly};

fn wave_row(station_id: i64, time: DateTime<Utc>) -> WaveObservation {
    WaveObservation {
        station_id,
        forecast_time: time,
        tp: 7.0,
        hs: station_id as f64,
        hmax: station_id as f64 * 1.8,
        tz: 5.0,
        wave_direction: 300.0,
    }
}

/// Stations 1 (24.0, 54.0), 2 (24.0, 54.5) and 3 (25.0, 55.0), each with six
/// hourly forecast rows.
async fn seeded() -> QueryService<MemoryStore> {
    let store = MemoryStore::new();
    let stations: Vec<NewStation> = [(1, 24.0, 54.0), (2, 24.0, 54.5), (3, 25.0, 55.0)]
        .into_iter()
        .map(|(id, lat, lon)| NewStation {
            id,
            lat,
            lon,
            name: Domain::Wave.station_name(id),
            description: String::new(),
        })
        .collect();
    store.insert_stations("wave_stations", &stations).await.unwrap();

    let mut writer = csv::Writer::from_writer(Vec::new());
    for id in 1..=3 {
        for time in hourly(6) {
            writer.serialize(wave_row(id, time)).unwrap();
        }
    }
    let buffer = writer.into_inner().unwrap();
    store
        .bulk_copy("wave_forecasts", WaveObservation::COLUMNS, buffer)
        .await
        .unwrap();

    QueryService::new(store, QueryLimits::default())
}

fn hours(from: i64, to: i64) -> TimeRange {
    TimeRange::new(
        cycle_start() + Duration::hours(from),
        cycle_start() + Duration::hours(to),
    )
    .unwrap()
}

// ============================================================================
// Single station
// ============================================================================

#[tokio::test]
async fn test_by_name_filters_range_inclusively() {
    let service = seeded().await;
    let lookup = StationLookup::Name("wave_station_2".to_string());

    let rows = service
        .by_station::<WaveObservation>(Domain::Wave, TableKind::Forecast, &lookup, &hours(1, 3))
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.station_name == "wave_station_2"));
    assert_eq!(rows[0].observation.forecast_time, cycle_start() + Duration::hours(1));
    assert_eq!(rows[2].observation.forecast_time, cycle_start() + Duration::hours(3));
    assert_eq!((rows[0].lat, rows[0].lon), (24.0, 54.5));
}

#[tokio::test]
async fn test_nearest_station() {
    let service = seeded().await;
    let lookup = StationLookup::Point(GeoPoint::new(24.9, 54.9));

    let rows = service
        .by_station::<WaveObservation>(Domain::Wave, TableKind::Forecast, &lookup, &hours(0, 5))
        .await
        .unwrap();
    assert_eq!(rows[0].station_name, "wave_station_3");
}

#[tokio::test]
async fn test_equidistant_point_is_repeatable() {
    let service = seeded().await;
    // Halfway between stations 1 and 2
    let lookup = StationLookup::Point(GeoPoint::new(24.0, 54.25));

    let first = service.station(Domain::Wave, &lookup).await.unwrap();
    for _ in 0..5 {
        let again = service.station(Domain::Wave, &lookup).await.unwrap();
        assert_eq!(again.id, first.id);
    }
    assert_eq!(first.id, 1);
}

#[tokio::test]
async fn test_unknown_name_is_station_not_found() {
    let service = seeded().await;
    let lookup = StationLookup::Name("wave_station_99".to_string());

    let err = service
        .by_station::<WaveObservation>(Domain::Wave, TableKind::Forecast, &lookup, &hours(0, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::StationNotFound(_)), "{}", err);
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_station_without_rows_in_window() {
    let service = seeded().await;
    let lookup = StationLookup::Name("wave_station_1".to_string());

    let err = service
        .by_station::<WaveObservation>(Domain::Wave, TableKind::Forecast, &lookup, &hours(10, 20))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::NoRowsInRange { .. }), "{}", err);

    // The archive was never loaded
    let err = service
        .by_station::<WaveObservation>(Domain::Wave, TableKind::Archive, &lookup, &hours(0, 5))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_domain_mismatch_is_invalid() {
    let service = seeded().await;
    let lookup = StationLookup::Name("wave_station_1".to_string());

    let err = service
        .by_station::<WindObservation>(Domain::Wave, TableKind::Forecast, &lookup, &hours(0, 5))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

// ============================================================================
// Bounding box
// ============================================================================

#[tokio::test]
async fn test_bbox_is_edge_inclusive_and_ordered() {
    let service = seeded().await;
    let bbox = BoundingBox::new(24.0, 24.0, 54.0, 54.5);

    let rows = service
        .by_bbox::<WaveObservation>(Domain::Wave, TableKind::Forecast, &bbox, &hours(0, 1))
        .await
        .unwrap();
    let keys: Vec<(i64, DateTime<Utc>)> = rows
        .iter()
        .map(|r| (r.observation.station_id, r.observation.forecast_time))
        .collect();
    let start = cycle_start();
    assert_eq!(
        keys,
        vec![
            (1, start),
            (1, start + Duration::hours(1)),
            (2, start),
            (2, start + Duration::hours(1)),
        ]
    );
}

#[tokio::test]
async fn test_empty_bbox_is_no_stations() {
    let service = seeded().await;
    let (min_lat, max_lat, min_lon, max_lon) = bbox::EMPTY_OCEAN;
    let bbox = BoundingBox::new(min_lat, max_lat, min_lon, max_lon);

    let err = service
        .by_bbox::<WaveObservation>(Domain::Wave, TableKind::Forecast, &bbox, &hours(0, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::NoStationsInBox(_)), "{}", err);
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_inverted_bbox_is_invalid() {
    let service = seeded().await;
    let bbox = BoundingBox::new(25.0, 24.0, 54.0, 55.0);

    let err = service
        .by_bbox::<WaveObservation>(Domain::Wave, TableKind::Forecast, &bbox, &hours(0, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidRequest(_)), "{}", err);
}

#[tokio::test]
async fn test_limits_apply() {
    let seeded = seeded().await;
    let limits = QueryLimits {
        max_bbox_degrees: Some(10.0),
        max_rows: Some(4),
    };
    let service = QueryService::new(seeded.store().clone(), limits);

    let (min_lat, max_lat, min_lon, max_lon) = bbox::OVERSIZED;
    let oversized = BoundingBox::new(min_lat, max_lat, min_lon, max_lon);
    let err = service
        .by_bbox::<WaveObservation>(Domain::Wave, TableKind::Forecast, &oversized, &hours(0, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::LimitExceeded(_)));

    let (min_lat, max_lat, min_lon, max_lon) = bbox::GULF;
    let gulf = BoundingBox::new(min_lat, max_lat, min_lon, max_lon);
    let err = service
        .by_bbox::<WaveObservation>(Domain::Wave, TableKind::Forecast, &gulf, &hours(0, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::LimitExceeded(_)));
}

#[tokio::test]
async fn test_enriched_rows_serialize_flat() {
    let service = seeded().await;
    let lookup = StationLookup::Name("wave_station_3".to_string());
    let rows = service
        .by_station::<WaveObservation>(Domain::Wave, TableKind::Forecast, &lookup, &hours(0, 0))
        .await
        .unwrap();

    let json = serde_json::to_value(&rows[0]).unwrap();
    assert_eq!(json["station_name"], "wave_station_3");
    assert_eq!(json["station_id"], 3);
    assert_eq!(json["forecast_time"], "2025-08-10 00:00:00");
    assert_eq!(json["hs"], 3.0);
}
