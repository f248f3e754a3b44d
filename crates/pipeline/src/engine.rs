//! The ingestion orchestrator.
//!
//! One call to [`IngestPipeline::ingest`] takes a raw vendor payload and a
//! source identity and drives it through map → validate → fingerprint →
//! upsert-or-quarantine. The pipeline is stateless per invocation and
//! idempotent end to end: the raw payload is appended to the bronze layer
//! before anything else, mapping and fingerprinting are pure, and the
//! upsert is keyed on the fingerprint — so replaying a stored payload
//! always converges to the same canonical state.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use mappers::mapper_for;
use model::{compute_fingerprint, SleepSource};
use validation::{validate, ValidationConfig};

use crate::error::PipelineError;
use crate::outcome::{
    violation_from_map_error, IngestReport, PipelineStage, QuarantineRecord, RecordOutcome,
    ReplayStats,
};
use crate::store::{QuarantineSink, RawResponseStore, RawVendorResponse, SleepRepository};

/// Orchestrator with its three injected storage capabilities.
///
/// Capabilities are constructor-injected; there is no ambient or global
/// adapter state anywhere in the pipeline.
pub struct IngestPipeline {
    repository: Arc<dyn SleepRepository>,
    raw_store: Arc<dyn RawResponseStore>,
    quarantine: Arc<dyn QuarantineSink>,
    validation: ValidationConfig,
}

impl IngestPipeline {
    pub fn new(
        repository: Arc<dyn SleepRepository>,
        raw_store: Arc<dyn RawResponseStore>,
        quarantine: Arc<dyn QuarantineSink>,
    ) -> Self {
        Self::with_validation(repository, raw_store, quarantine, ValidationConfig::default())
    }

    /// Construct with explicit validation knobs (tolerance, reference date).
    pub fn with_validation(
        repository: Arc<dyn SleepRepository>,
        raw_store: Arc<dyn RawResponseStore>,
        quarantine: Arc<dyn QuarantineSink>,
        validation: ValidationConfig,
    ) -> Self {
        Self {
            repository,
            raw_store,
            quarantine,
            validation,
        }
    }

    /// Ingest one raw vendor payload.
    ///
    /// Returns a report classifying every record in the payload as created,
    /// deduplicated, or quarantined. Only storage failures surface as
    /// `Err`; vendor-data problems never do.
    pub async fn ingest(
        &self,
        source: SleepSource,
        raw_payload: Value,
    ) -> Result<IngestReport, PipelineError> {
        let batch_id = Uuid::new_v4();
        let now = Utc::now();

        // Bronze layer first, unconditionally: whatever happens next, the
        // payload can be replayed.
        let raw_id = self
            .raw_store
            .append(RawVendorResponse {
                id: Uuid::new_v4(),
                source,
                payload: raw_payload.clone(),
                received_at: now,
            })
            .await?;
        info!(source = %source, raw_id = %raw_id, batch_id = %batch_id, "raw_response_stored");

        let mut report = IngestReport::new(batch_id);

        let records = match mapper_for(source).map(&raw_payload, now) {
            Ok(records) => records,
            Err(err) => {
                warn!(source = %source, error = %err, batch_id = %batch_id, "mapping_failed");
                let record = QuarantineRecord {
                    id: Uuid::new_v4(),
                    source,
                    stage: PipelineStage::Mapping,
                    raw_payload,
                    violations: vec![violation_from_map_error(&err)],
                    fingerprint: None,
                    effective_date: None,
                    failed_at: now,
                    resolved: false,
                };
                self.quarantine.append(record.clone()).await?;
                report.push(RecordOutcome::Quarantined { record });
                return Ok(report);
            }
        };

        for mut record in records {
            let violations = validate(&record, &self.validation);
            if !violations.is_empty() {
                warn!(
                    source = %source,
                    fingerprint = %record.fingerprint,
                    rules = ?violations.iter().map(|v| v.message.as_str()).collect::<Vec<_>>(),
                    "record_quarantined"
                );
                let quarantined = QuarantineRecord {
                    id: Uuid::new_v4(),
                    source,
                    stage: PipelineStage::Validation,
                    raw_payload: record.raw_payload.clone(),
                    violations,
                    fingerprint: Some(record.fingerprint.clone()),
                    effective_date: Some(record.effective_date),
                    failed_at: now,
                    resolved: false,
                };
                self.quarantine.append(quarantined.clone()).await?;
                report.push(RecordOutcome::Quarantined {
                    record: quarantined,
                });
                continue;
            }

            record.fingerprint =
                compute_fingerprint(record.source, &record.source_record_id, record.effective_date);
            record.ingested_at = now;
            record.updated_at = now;
            let fingerprint = record.fingerprint.clone();

            let upserted = self.repository.upsert(record).await?;
            let outcome = if upserted.was_inserted {
                RecordOutcome::Created {
                    id: upserted.id,
                    fingerprint: fingerprint.clone(),
                }
            } else {
                RecordOutcome::Deduplicated {
                    id: upserted.id,
                    fingerprint: fingerprint.clone(),
                }
            };
            info!(
                source = %source,
                fingerprint = %fingerprint,
                sleep_day_id = %upserted.id,
                was_inserted = upserted.was_inserted,
                "record_upserted"
            );
            report.push(outcome);
        }

        Ok(report)
    }

    /// Re-run the pipeline over every bronze-layer payload for a source.
    ///
    /// Safe to run any number of times: mapping and fingerprinting are
    /// pure and the upsert is idempotent, so the canonical table converges.
    pub async fn replay(&self, source: SleepSource) -> Result<ReplayStats, PipelineError> {
        let stored = self.raw_store.list_by_source(source).await?;
        let mut stats = ReplayStats::default();
        for raw in stored {
            let report = self.ingest(source, raw.payload).await?;
            stats.absorb(&report);
        }
        info!(
            source = %source,
            payloads_replayed = stats.payloads_replayed,
            records_created = stats.records_created,
            records_deduplicated = stats.records_deduplicated,
            records_quarantined = stats.records_quarantined,
            "replay_complete"
        );
        Ok(stats)
    }
}
