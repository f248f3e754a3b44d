//! Ingestion pipeline for wearable sleep telemetry.
//!
//! The orchestrator composes the vendor mappers, the validation engine,
//! and the identity fingerprint, and routes every record to either a
//! fingerprint-keyed upsert or an append-only quarantine sink:
//!
//! ```text
//! raw payload + source
//!       │
//!       ├─ bronze layer append (always, first)
//!       ▼
//!    mapper ──failure──────────────► quarantine (stage: mapping)
//!       │
//!       ▼
//!   validation ──violations──────► quarantine (stage: validation)
//!       │
//!       ▼
//!  fingerprint + upsert ─────────► Created | Deduplicated
//! ```
//!
//! Storage is consumed through the capability traits in [`store`]; the
//! pipeline knows nothing about how rows are kept.

mod engine;
mod error;
mod outcome;
mod source;
pub mod store;

pub use crate::engine::IngestPipeline;
pub use crate::error::PipelineError;
pub use crate::outcome::{
    IngestReport, PipelineStage, QuarantineRecord, RecordOutcome, ReplayStats,
};
pub use crate::source::{FixtureDataSource, SleepDataSource, SourceError};
pub use crate::store::{
    QuarantineSink, RawResponseStore, RawVendorResponse, SleepRepository, StoreError,
    UpsertOutcome,
};
