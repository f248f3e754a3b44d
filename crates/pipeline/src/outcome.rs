//! Structured outcomes of an ingest run.
//!
//! Every processed record is classified as created, deduplicated, or
//! quarantined — never silently dropped, never surfaced as a bare error
//! for expected vendor-data problems.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use mappers::MapError;
use model::SleepSource;
use validation::Violation;

/// Which pipeline stage rejected a quarantined payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Mapping,
    Validation,
}

/// Failure artifact for a payload or record that could not be ingested.
///
/// Carries the full raw payload and every violation, so the record can be
/// diagnosed and re-submitted without the original request. Append-only;
/// the pipeline never updates or deletes one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineRecord {
    pub id: Uuid,
    pub source: SleepSource,
    pub stage: PipelineStage,
    pub raw_payload: Value,
    /// Every rule the payload broke, in reporting order.
    pub violations: Vec<Violation>,
    /// Set when mapping succeeded and validation rejected the record.
    pub fingerprint: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub failed_at: DateTime<Utc>,
    /// Toggled by an external reprocessing flow, never by the pipeline.
    #[serde(default)]
    pub resolved: bool,
}

/// Terminal state of one record within an ingest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecordOutcome {
    /// New fingerprint; a row was inserted.
    Created { id: Uuid, fingerprint: String },
    /// Existing fingerprint; the row was overwritten in place.
    Deduplicated { id: Uuid, fingerprint: String },
    /// Mapping or validation rejected the record.
    Quarantined { record: QuarantineRecord },
}

/// Aggregate result of ingesting one raw payload (which may carry several
/// nights).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub batch_id: Uuid,
    pub outcomes: Vec<RecordOutcome>,
    pub records_created: usize,
    pub records_deduplicated: usize,
    pub records_quarantined: usize,
}

impl IngestReport {
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            outcomes: Vec::new(),
            records_created: 0,
            records_deduplicated: 0,
            records_quarantined: 0,
        }
    }

    pub fn push(&mut self, outcome: RecordOutcome) {
        match &outcome {
            RecordOutcome::Created { .. } => self.records_created += 1,
            RecordOutcome::Deduplicated { .. } => self.records_deduplicated += 1,
            RecordOutcome::Quarantined { .. } => self.records_quarantined += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn records_processed(&self) -> usize {
        self.outcomes.len()
    }
}

/// Totals from replaying the bronze layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStats {
    pub payloads_replayed: usize,
    pub records_created: usize,
    pub records_deduplicated: usize,
    pub records_quarantined: usize,
}

impl ReplayStats {
    pub(crate) fn absorb(&mut self, report: &IngestReport) {
        self.payloads_replayed += 1;
        self.records_created += report.records_created;
        self.records_deduplicated += report.records_deduplicated;
        self.records_quarantined += report.records_quarantined;
    }
}

/// Render a mapping failure as a quarantine violation entry, keeping the
/// same field/rule/message vocabulary the validation engine uses.
pub(crate) fn violation_from_map_error(err: &MapError) -> Violation {
    Violation {
        field: err.field().to_string(),
        rule: err.rule().to_string(),
        message: err.to_string(),
        actual: err.actual(),
    }
}
