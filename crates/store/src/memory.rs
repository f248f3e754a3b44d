//! In-memory backend: a `RwLock` around plain maps and vectors.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use model::{SleepDay, SleepSource};
use pipeline::store::{
    QuarantineSink, RawResponseStore, RawVendorResponse, SleepRepository, StoreError,
    UpsertOutcome,
};
use pipeline::QuarantineRecord;

use crate::merge_existing;

#[derive(Default)]
struct Inner {
    /// Canonical records keyed by fingerprint.
    sleep_days: HashMap<String, SleepDay>,
    /// Bronze layer, append order preserved.
    raw_responses: Vec<RawVendorResponse>,
    /// Quarantine, append order preserved.
    quarantine: Vec<QuarantineRecord>,
}

/// Volatile store for tests and ephemeral runs. All three capabilities in
/// one value; cheap to construct per test.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))
    }
}

#[async_trait]
impl SleepRepository for MemoryStore {
    async fn upsert(&self, record: SleepDay) -> Result<UpsertOutcome, StoreError> {
        // One write lock for the whole read-merge-insert; atomic per store.
        let mut guard = self.write()?;
        let fingerprint = record.fingerprint.clone();
        match guard.sleep_days.get(&fingerprint) {
            Some(existing) => {
                let merged = merge_existing(record, existing);
                let id = merged.id;
                guard.sleep_days.insert(fingerprint, merged);
                Ok(UpsertOutcome {
                    id,
                    was_inserted: false,
                })
            }
            None => {
                let id = record.id;
                guard.sleep_days.insert(fingerprint, record);
                Ok(UpsertOutcome {
                    id,
                    was_inserted: true,
                })
            }
        }
    }

    async fn get_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<SleepDay>, StoreError> {
        Ok(self.read()?.sleep_days.get(fingerprint).cloned())
    }

    async fn timeline(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SleepDay>, StoreError> {
        let guard = self.read()?;
        let mut records: Vec<SleepDay> = guard
            .sleep_days
            .values()
            .filter(|r| start.map_or(true, |s| r.effective_date >= s))
            .filter(|r| end.map_or(true, |e| r.effective_date < e))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            (a.effective_date, a.id).cmp(&(b.effective_date, b.id))
        });
        Ok(records)
    }
}

#[async_trait]
impl RawResponseStore for MemoryStore {
    async fn append(&self, response: RawVendorResponse) -> Result<Uuid, StoreError> {
        let id = response.id;
        self.write()?.raw_responses.push(response);
        Ok(id)
    }

    async fn list_by_source(
        &self,
        source: SleepSource,
    ) -> Result<Vec<RawVendorResponse>, StoreError> {
        Ok(self
            .read()?
            .raw_responses
            .iter()
            .filter(|r| r.source == source)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuarantineSink for MemoryStore {
    async fn append(&self, record: QuarantineRecord) -> Result<Uuid, StoreError> {
        let id = record.id;
        self.write()?.quarantine.push(record);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<QuarantineRecord>, StoreError> {
        Ok(self.read()?.quarantine.clone())
    }
}
