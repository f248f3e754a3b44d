//! Redb (Rust embedded database) backend.
//!
//! Pure-Rust, ACID, crash-safe by default, no external service to run.
//! Rows are serde_json-encoded; the canonical table is keyed by
//! fingerprint, the two append-only logs by a monotonically increasing
//! `u64` so iteration order is append order.
//!
//! Redb transactions are synchronous, so every operation clones the
//! `Arc<Database>` and runs inside `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use model::{SleepDay, SleepSource};
use pipeline::store::{
    QuarantineSink, RawResponseStore, RawVendorResponse, SleepRepository, StoreError,
    UpsertOutcome,
};
use pipeline::QuarantineRecord;

use crate::merge_existing;

/// Canonical records, keyed by fingerprint.
const SLEEP_DAYS: TableDefinition<&str, &[u8]> = TableDefinition::new("sleep_days");
/// Bronze layer, keyed by append sequence.
const RAW_RESPONSES: TableDefinition<u64, &[u8]> = TableDefinition::new("raw_responses");
/// Quarantine, keyed by append sequence.
const QUARANTINE: TableDefinition<u64, &[u8]> = TableDefinition::new("quarantine");

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::backend(err.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::codec(e.to_string()))
}

/// Durable store backed by a single redb file. Shares the database via
/// `Arc`; redb handles its own locking and MVCC.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database file and make sure all tables exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        debug!(path = %path.as_ref().display(), "opening redb store");
        let db = Database::create(&path).map_err(backend)?;

        // Opening a table inside a write transaction creates it.
        let write_txn = db.begin_write().map_err(backend)?;
        {
            write_txn.open_table(SLEEP_DAYS).map_err(backend)?;
            write_txn.open_table(RAW_RESPONSES).map_err(backend)?;
            write_txn.open_table(QUARANTINE).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;

        Ok(Self { db: Arc::new(db) })
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Database>) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(db))
            .await
            .map_err(|e| StoreError::backend(format!("blocking task failed: {e}")))?
    }

    /// Append to a sequence-keyed log table inside one write transaction.
    fn append_to_log<T: Serialize>(
        db: &Database,
        table_def: TableDefinition<'_, u64, &[u8]>,
        row: &T,
    ) -> Result<(), StoreError> {
        let bytes = encode(row)?;
        let write_txn = db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(table_def).map_err(backend)?;
            let next = match table.last().map_err(backend)? {
                Some((key, _)) => key.value() + 1,
                None => 0,
            };
            table.insert(next, bytes.as_slice()).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;
        Ok(())
    }

    /// Decode every row of a sequence-keyed log table, append order.
    fn scan_log<T: DeserializeOwned>(
        db: &Database,
        table_def: TableDefinition<'_, u64, &[u8]>,
    ) -> Result<Vec<T>, StoreError> {
        let read_txn = db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(table_def).map_err(backend)?;
        let mut rows = Vec::new();
        for item in table.iter().map_err(backend)? {
            let (_, value) = item.map_err(backend)?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl SleepRepository for RedbStore {
    async fn upsert(&self, record: SleepDay) -> Result<UpsertOutcome, StoreError> {
        self.run_blocking(move |db| {
            // Read, merge, and write under one write transaction; redb
            // serializes writers, so the upsert is atomic per fingerprint.
            let write_txn = db.begin_write().map_err(backend)?;
            let outcome = {
                let mut table = write_txn.open_table(SLEEP_DAYS).map_err(backend)?;
                let existing = match table
                    .get(record.fingerprint.as_str())
                    .map_err(backend)?
                {
                    Some(guard) => Some(decode::<SleepDay>(guard.value())?),
                    None => None,
                };
                let (row, was_inserted) = match existing {
                    Some(existing) => (merge_existing(record, &existing), false),
                    None => (record, true),
                };
                let bytes = encode(&row)?;
                table
                    .insert(row.fingerprint.as_str(), bytes.as_slice())
                    .map_err(backend)?;
                UpsertOutcome {
                    id: row.id,
                    was_inserted,
                }
            };
            write_txn.commit().map_err(backend)?;
            Ok(outcome)
        })
        .await
    }

    async fn get_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<SleepDay>, StoreError> {
        let fingerprint = fingerprint.to_string();
        self.run_blocking(move |db| {
            let read_txn = db.begin_read().map_err(backend)?;
            let table = read_txn.open_table(SLEEP_DAYS).map_err(backend)?;
            match table.get(fingerprint.as_str()).map_err(backend)? {
                Some(guard) => Ok(Some(decode(guard.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn timeline(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SleepDay>, StoreError> {
        self.run_blocking(move |db| {
            let read_txn = db.begin_read().map_err(backend)?;
            let table = read_txn.open_table(SLEEP_DAYS).map_err(backend)?;
            let mut records: Vec<SleepDay> = Vec::new();
            for item in table.iter().map_err(backend)? {
                let (_, value) = item.map_err(backend)?;
                let record: SleepDay = decode(value.value())?;
                if start.is_some_and(|s| record.effective_date < s) {
                    continue;
                }
                if end.is_some_and(|e| record.effective_date >= e) {
                    continue;
                }
                records.push(record);
            }
            records.sort_by(|a, b| {
                (a.effective_date, a.id).cmp(&(b.effective_date, b.id))
            });
            Ok(records)
        })
        .await
    }
}

#[async_trait]
impl RawResponseStore for RedbStore {
    async fn append(&self, response: RawVendorResponse) -> Result<Uuid, StoreError> {
        let id = response.id;
        self.run_blocking(move |db| Self::append_to_log(&db, RAW_RESPONSES, &response))
            .await?;
        Ok(id)
    }

    async fn list_by_source(
        &self,
        source: SleepSource,
    ) -> Result<Vec<RawVendorResponse>, StoreError> {
        let all: Vec<RawVendorResponse> = self
            .run_blocking(move |db| Self::scan_log(&db, RAW_RESPONSES))
            .await?;
        Ok(all.into_iter().filter(|r| r.source == source).collect())
    }
}

#[async_trait]
impl QuarantineSink for RedbStore {
    async fn append(&self, record: QuarantineRecord) -> Result<Uuid, StoreError> {
        let id = record.id;
        self.run_blocking(move |db| Self::append_to_log(&db, QUARANTINE, &record))
            .await?;
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<QuarantineRecord>, StoreError> {
        self.run_blocking(move |db| Self::scan_log(&db, QUARANTINE))
            .await
    }
}
