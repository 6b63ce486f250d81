//! Behaviour of the in-memory datastore.

use chrono::{Duration, TimeZone, Utc};
use forecast_common::{BoundingBox, Domain, GeoPoint, TableKind, TimeRange};
use storage::{
    observation_indexes, Datastore, MemoryStore, NewStation, StoreError, WaveObservation,
};

fn station(id: i64, lat: f64, lon: f64) -> NewStation {
    NewStation {
        id,
        lat,
        lon,
        name: Domain::Wave.station_name(id),
        description: String::new(),
    }
}

fn wave_buffer(rows: &[(i64, i64)]) -> Vec<u8> {
    let base = Utc.with_ymd_and_hms(2025, 8, 10, 0, 0, 0).unwrap();
    let mut writer = csv::Writer::from_writer(Vec::new());
    for &(station_id, hour) in rows {
        writer
            .serialize(WaveObservation {
                station_id,
                forecast_time: base + Duration::hours(hour),
                tp: 7.0,
                hs: 1.0,
                hmax: 1.8,
                tz: 5.0,
                wave_direction: 300.0,
            })
            .unwrap();
    }
    writer.into_inner().unwrap()
}

async fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert_stations(
            "wave_stations",
            &[station(1, 24.0, 54.0), station(2, 24.0, 54.5), station(3, 25.0, 55.0)],
        )
        .await
        .unwrap();
    store
}

const COLUMNS: &[&str] = &[
    "station_id",
    "forecast_time",
    "tp",
    "hs",
    "hmax",
    "tz",
    "wave_direction",
];

// ============================================================================
// Station tests
// ============================================================================

#[tokio::test]
async fn test_station_conflicts_are_ignored() {
    let store = seeded().await;
    let inserted = store
        .insert_stations(
            "wave_stations",
            &[station(1, 10.0, 10.0), station(9, 24.0, 54.0), station(4, 26.0, 56.0)],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 1);
    assert_eq!(store.count_rows("wave_stations").await.unwrap(), 4);
}

#[tokio::test]
async fn test_nearest_tie_goes_to_lowest_id() {
    let store = seeded().await;
    let midpoint = GeoPoint::new(24.0, 54.25);
    for _ in 0..3 {
        let nearest = store
            .nearest_station("wave_stations", midpoint)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(nearest.id, 1);
    }
}

#[tokio::test]
async fn test_bbox_edges_inclusive() {
    let store = seeded().await;
    let bbox = BoundingBox::new(24.0, 24.0, 54.0, 54.5);
    let ids: Vec<i64> = store
        .stations_in_bbox("wave_stations", &bbox)
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_unknown_table() {
    let store = MemoryStore::new();
    let err = store.load_stations("tide_stations").await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownTable(_)));
}

// ============================================================================
// Observation tests
// ============================================================================

#[tokio::test]
async fn test_copy_and_fetch() {
    let store = seeded().await;
    let copied = store
        .bulk_copy("wave_forecasts", COLUMNS, wave_buffer(&[(2, 1), (1, 1), (1, 0), (3, 0)]))
        .await
        .unwrap();
    assert_eq!(copied, 4);

    let range = TimeRange::parse("2025-08-10T00:00:00Z", "2025-08-10T01:00:00Z").unwrap();
    let rows: Vec<WaveObservation> = store
        .fetch_rows("wave_forecasts", &[1, 2], &range)
        .await
        .unwrap();
    let keys: Vec<(i64, u32)> = rows
        .iter()
        .map(|r| (r.station_id, chrono::Timelike::hour(&r.forecast_time)))
        .collect();
    assert_eq!(keys, vec![(1, 0), (1, 1), (2, 1)]);
}

#[tokio::test]
async fn test_copy_rejects_orphan_rows() {
    let store = seeded().await;
    let err = store
        .bulk_copy("wave_forecasts", COLUMNS, wave_buffer(&[(1, 0), (42, 0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Constraint { .. }));
    assert_eq!(store.count_rows("wave_forecasts").await.unwrap(), 0);
}

#[tokio::test]
async fn test_copy_rejects_duplicate_keys() {
    let store = seeded().await;
    store
        .bulk_copy("wave_forecasts", COLUMNS, wave_buffer(&[(1, 0)]))
        .await
        .unwrap();
    let err = store
        .bulk_copy("wave_forecasts", COLUMNS, wave_buffer(&[(1, 0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Constraint { .. }));
}

#[tokio::test]
async fn test_station_purge_cascades() {
    let store = seeded().await;
    store
        .bulk_copy("wave_forecasts", COLUMNS, wave_buffer(&[(1, 0), (2, 0)]))
        .await
        .unwrap();
    store
        .bulk_copy("wave_archive", COLUMNS, wave_buffer(&[(1, 0)]))
        .await
        .unwrap();

    assert_eq!(store.purge_stations("wave_stations").await.unwrap(), 3);
    assert_eq!(store.count_rows("wave_forecasts").await.unwrap(), 0);
    assert_eq!(store.count_rows("wave_archive").await.unwrap(), 0);
}

#[tokio::test]
async fn test_cluster_requires_index() {
    let store = seeded().await;
    let tables = Domain::Wave.tables();
    let indexes = observation_indexes(&tables, TableKind::Forecast);

    assert!(store.cluster("wave_forecasts", &indexes[0].name).await.is_err());

    for index in &indexes {
        store.ensure_index(index).await.unwrap();
        store.ensure_index(index).await.unwrap();
    }
    store.cluster("wave_forecasts", &indexes[0].name).await.unwrap();
    assert_eq!(store.indexes_on("wave_forecasts").await.len(), 3);
    assert_eq!(
        store.clustered_on("wave_forecasts").await.as_deref(),
        Some("wave_forecast_time_station_idx")
    );
}

#[tokio::test]
async fn test_injected_copy_failure() {
    let store = seeded().await;
    store.fail_copies_after(1);
    store
        .bulk_copy("wave_forecasts", COLUMNS, wave_buffer(&[(1, 0)]))
        .await
        .unwrap();
    let err = store
        .bulk_copy("wave_forecasts", COLUMNS, wave_buffer(&[(2, 0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Connection(_)));
}
