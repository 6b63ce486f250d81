//! Station identity resolution.
//!
//! Coordinates are compared as [`CoordKey`]s at one precision. Identifiers of
//! persisted coordinates never change; unseen coordinates are minted ids
//! above the current maximum (`1..K` on an empty table) in first-seen order.

use forecast_common::{CoordKey, Domain};
use std::collections::{HashMap, HashSet};
use storage::{Datastore, NewStation};
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestionError, Result};

/// Coordinate to station id mapping for one cycle.
#[derive(Debug, Clone, Default)]
pub struct StationAssignment {
    ids: HashMap<CoordKey, i64>,
    /// Distinct coordinates in first-seen order.
    order: Vec<CoordKey>,
    /// Stations created by this resolution.
    pub created: usize,
    /// Coordinates that already had a station.
    pub existing: usize,
}

impl StationAssignment {
    pub fn get(&self, key: &CoordKey) -> Option<i64> {
        self.ids.get(key).copied()
    }

    /// Number of distinct coordinates resolved.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(coordinate, id)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&CoordKey, i64)> + '_ {
        self.order.iter().filter_map(|k| self.ids.get(k).map(|id| (k, *id)))
    }
}

impl FromIterator<(CoordKey, i64)> for StationAssignment {
    fn from_iter<I: IntoIterator<Item = (CoordKey, i64)>>(pairs: I) -> Self {
        let mut assignment = Self::default();
        for (key, id) in pairs {
            if assignment.ids.insert(key, id).is_none() {
                assignment.order.push(key);
            }
        }
        assignment
    }
}

/// Resolves coordinates against a domain's station table.
pub struct StationResolver<'a, S> {
    store: &'a S,
    domain: Domain,
    batch_size: usize,
}

impl<'a, S: Datastore> StationResolver<'a, S> {
    pub fn new(store: &'a S, domain: Domain, batch_size: usize) -> Self {
        Self {
            store,
            domain,
            batch_size: batch_size.max(1),
        }
    }

    /// Assign an id to every distinct key, persisting new stations.
    ///
    /// `source` only labels log lines and errors.
    #[instrument(skip(self, keys), fields(domain = %self.domain))]
    pub async fn resolve<I>(&self, source: &str, keys: I) -> Result<StationAssignment>
    where
        I: IntoIterator<Item = CoordKey>,
    {
        let table = self.domain.tables().stations;

        let mut seen = HashSet::new();
        let order: Vec<CoordKey> = keys.into_iter().filter(|k| seen.insert(*k)).collect();
        let precision = match order.first() {
            Some(key) => key.precision(),
            None => return Ok(StationAssignment::default()),
        };

        let persisted = self.store.load_stations(&table).await?;
        let mut ids = key_map(&persisted, precision);
        let mut next_id = persisted.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let cold_start = persisted.is_empty();

        let candidates: Vec<NewStation> = order
            .iter()
            .filter(|key| !ids.contains_key(*key))
            .map(|key| {
                let station = NewStation::at(self.domain, next_id, key);
                next_id += 1;
                station
            })
            .collect();
        let existing = order.len() - candidates.len();

        debug!(
            distinct = order.len(),
            existing,
            candidates = candidates.len(),
            cold_start,
            "Resolving stations"
        );

        let mut inserted = 0u64;
        for batch in candidates.chunks(self.batch_size) {
            inserted += self.store.insert_stations(&table, batch).await?;
        }

        if inserted as usize != candidates.len() {
            warn!(
                offered = candidates.len(),
                inserted,
                "Some stations already existed; re-reading station table"
            );
        }
        if !candidates.is_empty() {
            // Resolve through the store so conflicting inserts map to the
            // station that won.
            let reloaded = self.store.load_stations(&table).await?;
            ids = key_map(&reloaded, precision);
        }

        let missing: Vec<&CoordKey> = order.iter().filter(|k| !ids.contains_key(*k)).collect();
        if let Some(first) = missing.first() {
            return Err(IngestionError::StationMismatch {
                source_name: source.to_string(),
                unresolved: missing.len(),
                cells: order.len(),
                example: first.to_string(),
            });
        }

        info!(
            table = %table,
            stations = order.len(),
            created = inserted,
            existing,
            "Stations resolved"
        );

        Ok(StationAssignment {
            ids,
            order,
            created: inserted as usize,
            existing,
        })
    }
}

fn key_map(stations: &[storage::Station], precision: u32) -> HashMap<CoordKey, i64> {
    let mut map = HashMap::with_capacity(stations.len());
    for station in stations {
        if let Some(key) = station.key(precision) {
            // Lowest id wins if two persisted stations round together.
            map.entry(key).or_insert(station.id);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::MemoryStore;

    fn key(lat: f64, lon: f64) -> CoordKey {
        CoordKey::new(lat, lon, 4).unwrap()
    }

    #[tokio::test]
    async fn test_cold_start_mints_in_first_seen_order() {
        let store = MemoryStore::new();
        let resolver = StationResolver::new(&store, Domain::Wind, 2);
        let keys = vec![key(2.0, 2.0), key(1.0, 1.0), key(2.0, 2.0), key(3.0, 3.0)];

        let assignment = resolver.resolve("test", keys).await.unwrap();
        assert_eq!(assignment.len(), 3);
        assert_eq!(assignment.get(&key(2.0, 2.0)), Some(1));
        assert_eq!(assignment.get(&key(1.0, 1.0)), Some(2));
        assert_eq!(assignment.get(&key(3.0, 3.0)), Some(3));
        assert_eq!(assignment.created, 3);

        let stations = store.load_stations("wind_stations").await.unwrap();
        assert_eq!(stations[0].name, "wind_station_1");
    }

    #[tokio::test]
    async fn test_warm_start_keeps_ids_and_extends() {
        let store = MemoryStore::new();
        let resolver = StationResolver::new(&store, Domain::Wave, 10);
        resolver
            .resolve("first", vec![key(1.0, 1.0), key(2.0, 2.0)])
            .await
            .unwrap();

        // Fewer, reordered and new coordinates in the next cycle
        let second = resolver
            .resolve("second", vec![key(5.0, 5.0), key(2.0, 2.0)])
            .await
            .unwrap();
        assert_eq!(second.get(&key(2.0, 2.0)), Some(2));
        assert_eq!(second.get(&key(5.0, 5.0)), Some(3));
        assert_eq!(second.existing, 1);
        assert_eq!(second.created, 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let store = MemoryStore::new();
        let resolver = StationResolver::new(&store, Domain::Wind, 10);
        let assignment = resolver.resolve("empty", Vec::new()).await.unwrap();
        assert!(assignment.is_empty());
    }
}
