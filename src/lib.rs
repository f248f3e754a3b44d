//! Sleep Harmonizer — wearable sleep telemetry, harmonized.
//!
//! Vendor payloads (Oura, Withings) are mapped to one canonical
//! [`SleepDay`] shape, validated against plausibility rules, keyed by a
//! deterministic SHA-256 fingerprint, and upserted into storage; records
//! that fail are quarantined with machine-readable violations. Raw
//! payloads land in an append-only bronze layer first, so any ingest can
//! be replayed. Canonical records render to FHIR R4 Observations on the
//! way out.
//!
//! This crate is the umbrella: it re-exports the member crates and holds
//! the service binary and its configuration.

pub mod config;

pub use config::{HarmonizerConfig, StoreKind};

pub use fhir::to_observation;
pub use mappers::{mapper_for, MapError, SleepMapper};
pub use model::{compute_fingerprint, SleepDay, SleepSource};
pub use pipeline::{
    FixtureDataSource, IngestPipeline, IngestReport, PipelineError, PipelineStage,
    QuarantineRecord, RecordOutcome, ReplayStats, SleepDataSource,
};
pub use store::{MemoryStore, RedbStore};
pub use validation::{validate, ValidationConfig, Violation};
