//! PostgreSQL/PostGIS datastore.

use async_trait::async_trait;
use forecast_common::{BoundingBox, Domain, GeoPoint, TableKind, TableSet, TimeRange, SRID_WGS84};
use sqlx::postgres::{PgConnectOptions, PgPoolCopyExt, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use tracing::{debug, info};

use crate::datastore::{observation_indexes, station_location_index, Datastore, IndexSpec};
use crate::error::{StoreError, StoreResult};
use crate::models::{value_columns, NewStation, Observation, Station};

const STATION_COLUMNS: &str = "id, ST_Y(location::geometry) AS lat, ST_X(location::geometry) AS lon, \
     name, description, created_at, updated_at";

/// Datastore backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with the session time zone pinned to UTC, so naive copy
    /// timestamps are read as UTC.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Connection(format!("Invalid database URL: {}", e)))?
            .options([("timezone", "UTC")]);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute(&self, sql: &str, what: &str) -> StoreResult<u64> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| StoreError::Database(format!("{} failed: {}", what, e)))
    }
}

/// Reject anything but lowercase SQL identifiers before interpolation.
fn ident(name: &str) -> StoreResult<&str> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

fn column_list(columns: &[&str]) -> StoreResult<String> {
    Ok(columns
        .iter()
        .map(|c| ident(c))
        .collect::<StoreResult<Vec<_>>>()?
        .join(", "))
}

/// DDL for one domain's tables.
fn schema_statements(tables: &TableSet) -> Vec<String> {
    let values = value_columns(tables.domain)
        .iter()
        .map(|c| format!("    {} DOUBLE PRECISION", c))
        .collect::<Vec<_>>()
        .join(",\n");

    let mut statements = vec![format!(
        r#"
CREATE TABLE IF NOT EXISTS {stations} (
    id BIGINT PRIMARY KEY,
    location geography(Point, {srid}) NOT NULL UNIQUE,
    name VARCHAR(100) NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
        stations = tables.stations,
        srid = SRID_WGS84,
    )];

    for kind in [TableKind::Forecast, TableKind::Archive] {
        statements.push(format!(
            r#"
CREATE TABLE IF NOT EXISTS {table} (
    id BIGSERIAL PRIMARY KEY,
    station_id BIGINT NOT NULL REFERENCES {stations}(id) ON DELETE CASCADE,
    forecast_time TIMESTAMPTZ NOT NULL,
{values},
    UNIQUE (station_id, forecast_time)
)"#,
            table = tables.observations(kind),
            stations = tables.stations,
            values = values,
        ));
    }

    statements
}

fn copy_statement(table: &str, columns: &[&str]) -> StoreResult<String> {
    Ok(format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, HEADER true)",
        ident(table)?,
        column_list(columns)?
    ))
}

fn index_statement(index: &IndexSpec) -> StoreResult<String> {
    let columns = index.columns.iter().map(String::as_str).collect::<Vec<_>>();
    Ok(format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} USING {} ({})",
        ident(&index.name)?,
        ident(&index.table)?,
        index.method.as_sql(),
        column_list(&columns)?
    ))
}

#[async_trait]
impl Datastore for PgStore {
    async fn migrate(&self) -> StoreResult<()> {
        self.execute("CREATE EXTENSION IF NOT EXISTS postgis", "Migration")
            .await?;

        for domain in [Domain::Wind, Domain::Wave] {
            let tables = domain.tables();
            for statement in schema_statements(&tables) {
                self.execute(statement.trim(), "Migration").await?;
            }
            self.ensure_index(&station_location_index(&tables)).await?;
            for kind in [TableKind::Forecast, TableKind::Archive] {
                for index in observation_indexes(&tables, kind) {
                    self.ensure_index(&index).await?;
                }
            }
            info!(domain = %domain, "Schema ready");
        }
        Ok(())
    }

    async fn load_stations(&self, table: &str) -> StoreResult<Vec<Station>> {
        let sql = format!("SELECT {} FROM {} ORDER BY id", STATION_COLUMNS, ident(table)?);
        sqlx::query_as::<_, Station>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Loading stations failed: {}", e)))
    }

    async fn insert_stations(&self, table: &str, stations: &[NewStation]) -> StoreResult<u64> {
        if stations.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            r#"
            INSERT INTO {} (id, location, name, description, created_at, updated_at)
            SELECT s.id,
                   ST_SetSRID(ST_MakePoint(s.lon, s.lat), {})::geography,
                   s.name, s.description, NOW(), NOW()
            FROM UNNEST($1::bigint[], $2::float8[], $3::float8[], $4::text[], $5::text[])
                AS s(id, lat, lon, name, description)
            ON CONFLICT DO NOTHING
            "#,
            ident(table)?,
            SRID_WGS84
        );

        let ids: Vec<i64> = stations.iter().map(|s| s.id).collect();
        let lats: Vec<f64> = stations.iter().map(|s| s.lat).collect();
        let lons: Vec<f64> = stations.iter().map(|s| s.lon).collect();
        let names: Vec<String> = stations.iter().map(|s| s.name.clone()).collect();
        let descriptions: Vec<String> = stations.iter().map(|s| s.description.clone()).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let inserted = sqlx::query(&sql)
            .bind(&ids)
            .bind(&lats)
            .bind(&lons)
            .bind(&names)
            .bind(&descriptions)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(format!("Station insert failed: {}", e)))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Station insert commit failed: {}", e)))?;

        debug!(table, offered = stations.len(), inserted, "Inserted stations");
        Ok(inserted)
    }

    async fn truncate(&self, table: &str) -> StoreResult<()> {
        let sql = format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", ident(table)?);
        self.execute(&sql, "Truncate").await?;
        Ok(())
    }

    async fn bulk_copy(&self, table: &str, columns: &[&str], buffer: Vec<u8>) -> StoreResult<u64> {
        let statement = copy_statement(table, columns)?;
        let mut copy = self
            .pool
            .copy_in_raw(&statement)
            .await
            .map_err(|e| StoreError::Database(format!("COPY into {} failed: {}", table, e)))?;
        copy.send(buffer)
            .await
            .map_err(|e| StoreError::Database(format!("COPY into {} failed: {}", table, e)))?;
        copy.finish()
            .await
            .map_err(|e| StoreError::Database(format!("COPY into {} failed: {}", table, e)))
    }

    async fn ensure_index(&self, index: &IndexSpec) -> StoreResult<()> {
        self.execute(&index_statement(index)?, "Create index").await?;
        Ok(())
    }

    async fn cluster(&self, table: &str, index: &str) -> StoreResult<()> {
        let sql = format!("CLUSTER {} USING {}", ident(table)?, ident(index)?);
        self.execute(&sql, "Cluster").await?;
        Ok(())
    }

    async fn station_by_name(&self, table: &str, name: &str) -> StoreResult<Option<Station>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE name = $1 ORDER BY id LIMIT 1",
            STATION_COLUMNS,
            ident(table)?
        );
        sqlx::query_as::<_, Station>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Station lookup failed: {}", e)))
    }

    async fn nearest_station(&self, table: &str, point: GeoPoint) -> StoreResult<Option<Station>> {
        let sql = format!(
            "SELECT {} FROM {} \
             ORDER BY ST_Distance(location, ST_SetSRID(ST_MakePoint($1, $2), {})::geography), id \
             LIMIT 1",
            STATION_COLUMNS,
            ident(table)?,
            SRID_WGS84
        );
        sqlx::query_as::<_, Station>(&sql)
            .bind(point.lon)
            .bind(point.lat)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Nearest station lookup failed: {}", e)))
    }

    async fn stations_in_bbox(&self, table: &str, bbox: &BoundingBox) -> StoreResult<Vec<Station>> {
        let sql = format!(
            "SELECT {} FROM {} \
             WHERE ST_Y(location::geometry) BETWEEN $1 AND $2 \
               AND ST_X(location::geometry) BETWEEN $3 AND $4 \
             ORDER BY id",
            STATION_COLUMNS,
            ident(table)?
        );
        sqlx::query_as::<_, Station>(&sql)
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .bind(bbox.min_lon)
            .bind(bbox.max_lon)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Bounding box lookup failed: {}", e)))
    }

    async fn fetch_rows<T: Observation>(
        &self,
        table: &str,
        station_ids: &[i64],
        range: &TimeRange,
    ) -> StoreResult<Vec<T>> {
        let sql = format!(
            "SELECT {} FROM {} \
             WHERE station_id = ANY($1) AND forecast_time BETWEEN $2 AND $3 \
             ORDER BY station_id, forecast_time",
            column_list(T::COLUMNS)?,
            ident(table)?
        );
        sqlx::query_as::<_, T>(&sql)
            .bind(station_ids)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Row fetch from {} failed: {}", table, e)))
    }

    async fn purge_stations(&self, table: &str) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {}", ident(table)?);
        self.execute(&sql, "Station purge").await
    }

    async fn purge_rows(&self, table: &str) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {}", ident(table)?);
        self.execute(&sql, "Row purge").await
    }

    async fn count_rows(&self, table: &str) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", ident(table)?);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Count failed: {}", e)))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WaveObservation;

    #[test]
    fn test_ident_validation() {
        assert!(ident("wind_forecasts").is_ok());
        assert!(ident("wind_forecasts; DROP TABLE x").is_err());
        assert!(ident("Wind").is_err());
        assert!(ident("1abc").is_err());
        assert!(ident("").is_err());
    }

    #[test]
    fn test_schema_has_cascade_and_unique_point() {
        let statements = schema_statements(&Domain::Wave.tables());
        assert_eq!(statements.len(), 3);
        assert!(statements[0].contains("geography(Point, 4326) NOT NULL UNIQUE"));
        assert!(statements[1].contains("REFERENCES wave_stations(id) ON DELETE CASCADE"));
        assert!(statements[2].contains("wave_archive"));
        assert!(statements[2].contains("wave_direction DOUBLE PRECISION"));
    }

    #[test]
    fn test_copy_statement() {
        let sql = copy_statement("wave_forecasts", WaveObservation::COLUMNS).unwrap();
        assert_eq!(
            sql,
            "COPY wave_forecasts (station_id, forecast_time, tp, hs, hmax, tz, wave_direction) \
             FROM STDIN WITH (FORMAT csv, HEADER true)"
        );
        assert!(copy_statement("wave_forecasts", &["tp; --"]).is_err());
    }

    #[test]
    fn test_index_statement() {
        let tables = Domain::Wind.tables();
        let sql = index_statement(&station_location_index(&tables)).unwrap();
        assert_eq!(
            sql,
            "CREATE INDEX IF NOT EXISTS wind_station_location_gist ON wind_stations USING gist (location)"
        );
    }
}
