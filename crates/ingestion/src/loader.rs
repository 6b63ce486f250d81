//! Chunked bulk loading with full-table replace semantics.
//!
//! A replace truncates the target table, then copies the rows in bounded
//! chunks. Each chunk is serialized to its own CSV buffer, which is handed to
//! the store and released before the next chunk is built. If a chunk fails
//! the table stays truncated and partially filled; the cycle must be re-run.

use forecast_common::{TableKind, TableSet};
use serde::Serialize;
use std::time::Instant;
use storage::{observation_indexes, Datastore, Observation};
use tracing::{debug, error, info, instrument};

use crate::error::{IngestionError, Result};

/// Loader tuning, usually taken from [`crate::EtlConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub chunk_size: usize,
    pub maintain_indexes: bool,
    pub cluster_after_load: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500_000,
            maintain_indexes: true,
            cluster_after_load: true,
        }
    }
}

/// Outcome of replacing one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub rows: usize,
    pub chunks: usize,
}

/// Serialize rows to a CSV buffer whose header is the row type's fields.
pub fn serialize_chunk<T: Serialize>(table: &str, rows: &[T]) -> Result<Vec<u8>> {
    let serialize_err = |message: String| IngestionError::Serialize {
        table: table.to_string(),
        message,
    };

    let mut writer = csv::Writer::from_writer(Vec::with_capacity(rows.len() * 64));
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| serialize_err(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| serialize_err(e.to_string()))
}

pub struct BulkLoader<'a, S> {
    store: &'a S,
    options: LoadOptions,
}

impl<'a, S: Datastore> BulkLoader<'a, S> {
    pub fn new(store: &'a S, options: LoadOptions) -> Self {
        Self {
            store,
            options: LoadOptions {
                chunk_size: options.chunk_size.max(1),
                ..options
            },
        }
    }

    /// Replace the contents of one observation table with `rows`.
    #[instrument(skip(self, tables, rows), fields(table = %tables.observations(kind), rows = rows.len()))]
    pub async fn replace<T: Observation>(
        &self,
        tables: &TableSet,
        kind: TableKind,
        rows: &[T],
    ) -> Result<LoadReport> {
        let table = tables.observations(kind);
        let started = Instant::now();

        self.store.truncate(table).await?;

        let mut chunks = 0;
        for (index, chunk) in rows.chunks(self.options.chunk_size).enumerate() {
            let offset = index * self.options.chunk_size;
            let buffer = serialize_chunk(table, chunk)?;
            let bytes = buffer.len();

            let copied = self
                .store
                .bulk_copy(table, T::COLUMNS, buffer)
                .await
                .map_err(|source| {
                    error!(
                        table,
                        chunk = index,
                        offset,
                        rows = chunk.len(),
                        error = %source,
                        "Chunk load failed; table left partially loaded"
                    );
                    IngestionError::BulkLoad {
                        table: table.to_string(),
                        chunk: index,
                        offset,
                        source,
                    }
                })?;

            if copied as usize != chunk.len() {
                return Err(IngestionError::LoadVerification {
                    table: table.to_string(),
                    sent: offset + chunk.len(),
                    stored: offset as u64 + copied,
                });
            }
            chunks += 1;
            debug!(table, chunk = index, offset, rows = copied, bytes, "Chunk loaded");
        }

        let stored = self.store.count_rows(table).await?;
        if stored != rows.len() as u64 {
            return Err(IngestionError::LoadVerification {
                table: table.to_string(),
                sent: rows.len(),
                stored,
            });
        }

        let indexes = observation_indexes(tables, kind);
        if self.options.maintain_indexes {
            for index in &indexes {
                self.store.ensure_index(index).await?;
            }
        }
        if self.options.cluster_after_load {
            if let Some(primary) = indexes.first() {
                // CLUSTER needs its index even when the others are not kept
                if !self.options.maintain_indexes {
                    self.store.ensure_index(primary).await?;
                }
                self.store.cluster(table, &primary.name).await?;
            }
        }

        info!(
            table,
            rows = rows.len(),
            chunks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Table replaced"
        );

        Ok(LoadReport {
            table: table.to_string(),
            rows: rows.len(),
            chunks,
        })
    }
}
