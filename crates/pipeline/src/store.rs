//! Storage capability traits consumed by the orchestrator.
//!
//! The pipeline depends on three narrow, injectable capabilities and
//! nothing else about persistence: a fingerprint-keyed repository, an
//! append-only bronze-layer store for raw payloads, and an append-only
//! quarantine sink. Implementations live in the `store` crate; tests bring
//! their own.
//!
//! Concurrency discipline belongs to the implementation: `upsert` must be
//! atomic under concurrent calls with the same fingerprint. The pipeline
//! performs no locking of its own.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use model::{SleepDay, SleepSource};

use crate::outcome::QuarantineRecord;

/// Infrastructure failure in a storage backend. Fatal to the current
/// `ingest` call; never produced by vendor-data problems.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored row could not be encoded or decoded: {0}")]
    Codec(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        StoreError::Codec(msg.into())
    }
}

/// Result of a fingerprint-keyed upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Storage identity of the row (freshly assigned or pre-existing).
    pub id: Uuid,
    /// True if the fingerprint was new and a row was inserted.
    pub was_inserted: bool,
}

/// One raw vendor payload as received, before any interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVendorResponse {
    pub id: Uuid,
    pub source: SleepSource,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// Canonical sleep record persistence, keyed on the identity fingerprint.
#[async_trait]
pub trait SleepRepository: Send + Sync {
    /// Insert the record if its fingerprint is new, otherwise overwrite the
    /// existing row's metric and provenance fields in place (last write
    /// wins), preserving the row id and the original `ingested_at` and
    /// refreshing `updated_at`. Must be atomic per fingerprint.
    async fn upsert(&self, record: SleepDay) -> Result<UpsertOutcome, StoreError>;

    /// Fetch one record by fingerprint.
    async fn get_by_fingerprint(&self, fingerprint: &str)
        -> Result<Option<SleepDay>, StoreError>;

    /// Read path: records with `start <= effective_date < end`, ordered by
    /// `(effective_date, id)`. Open bounds when `None`.
    async fn timeline(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SleepDay>, StoreError>;
}

/// Append-only bronze layer. Written before mapping, whatever the outcome,
/// so any ingest can be replayed later.
#[async_trait]
pub trait RawResponseStore: Send + Sync {
    async fn append(&self, response: RawVendorResponse) -> Result<Uuid, StoreError>;

    /// All stored payloads for a source, oldest first. Drives replay.
    async fn list_by_source(
        &self,
        source: SleepSource,
    ) -> Result<Vec<RawVendorResponse>, StoreError>;
}

/// Append-only quarantine storage. The pipeline writes and never touches an
/// entry again; resolution is an external workflow's concern.
#[async_trait]
pub trait QuarantineSink: Send + Sync {
    async fn append(&self, record: QuarantineRecord) -> Result<Uuid, StoreError>;

    /// All quarantined records, oldest first.
    async fn list(&self) -> Result<Vec<QuarantineRecord>, StoreError>;
}
