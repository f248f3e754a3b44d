//! End-to-end pipeline tests: raw vendor payload in, canonical rows,
//! bronze-layer entries, and quarantine records out.

use std::sync::Arc;

use serde_json::{json, Value};

use pipeline::store::{QuarantineSink, RawResponseStore, SleepRepository};
use sleep_harmonizer::{
    IngestPipeline, MemoryStore, PipelineStage, RecordOutcome, RedbStore, SleepSource,
    ValidationConfig,
};

fn memory_pipeline() -> (IngestPipeline, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestPipeline::new(store.clone(), store.clone(), store.clone());
    (pipeline, store)
}

/// A clean Oura night: stages sum exactly to the total.
fn oura_payload() -> Value {
    json!({
        "data": [{
            "id": "oura-night-1",
            "day": "2024-06-10",
            "type": "long_sleep",
            "period": 0,
            "total_sleep_duration": 25_200,
            "deep_sleep_duration": 5_400,
            "light_sleep_duration": 12_000,
            "rem_sleep_duration": 6_900,
            "awake_time": 900,
            "efficiency": 92,
            "bedtime_start": "2024-06-09T23:04:12-06:00",
            "bedtime_end": "2024-06-10T07:18:54-06:00",
            "average_hrv": 48,
            "latency": 540
        }]
    })
}

fn withings_payload() -> Value {
    json!({
        "status": 0,
        "body": {
            "series": [{
                "id": 2_075_648_291_i64,
                "date": "2024-06-10",
                "startdate": 1_717_973_700,
                "enddate": 1_717_999_500,
                "timezone": "Europe/Paris",
                "model": 32,
                "data": {
                    "total_sleep_time": 24_600,
                    "deepsleepduration": 5_700,
                    "lightsleepduration": 12_300,
                    "remsleepduration": 6_000,
                    "wakeupduration": 600,
                    "sleep_efficiency": 0.9,
                    "sleep_score": 78,
                    "night_events": "{\"1\": 2}"
                }
            }]
        }
    })
}

#[tokio::test]
async fn first_ingest_creates_then_replays_deduplicate() {
    let (pipeline, store) = memory_pipeline();

    let first = pipeline
        .ingest(SleepSource::Oura, oura_payload())
        .await
        .expect("ingest");
    assert_eq!(first.records_created, 1);
    assert_eq!(first.records_deduplicated, 0);
    assert_eq!(first.records_quarantined, 0);

    let fingerprint = match &first.outcomes[0] {
        RecordOutcome::Created { fingerprint, .. } => fingerprint.clone(),
        other => panic!("expected created, got {other:?}"),
    };

    let second = pipeline
        .ingest(SleepSource::Oura, oura_payload())
        .await
        .expect("ingest again");
    assert_eq!(second.records_created, 0);
    assert_eq!(second.records_deduplicated, 1);

    // One canonical row, identity stable across the dedup.
    let timeline = store.timeline(None, None).await.expect("timeline");
    assert_eq!(timeline.len(), 1);
    let row = store
        .get_by_fingerprint(&fingerprint)
        .await
        .expect("get")
        .expect("row present");
    assert_eq!(row.id, timeline[0].id);
}

#[tokio::test]
async fn canonical_fields_and_overflow_survive_ingestion() {
    let (pipeline, store) = memory_pipeline();
    pipeline
        .ingest(SleepSource::Oura, oura_payload())
        .await
        .expect("ingest");

    let rows = store.timeline(None, None).await.expect("timeline");
    let row = &rows[0];
    assert_eq!(row.source_record_id, "oura-night-1");
    assert_eq!(row.total_sleep_minutes, Some(420));
    assert_eq!(row.deep_sleep_minutes, Some(90));
    assert_eq!(row.light_sleep_minutes, Some(200));
    assert_eq!(row.rem_sleep_minutes, Some(115));
    assert_eq!(row.awake_minutes, Some(15));
    assert_eq!(row.sleep_efficiency, Some(0.92));
    assert_eq!(row.effective_date.to_string(), "2024-06-10");

    // Nothing from the vendor entry is lost.
    assert_eq!(row.extra.get("average_hrv"), Some(&json!(48)));
    assert_eq!(row.extra.get("latency"), Some(&json!(540)));
    assert_eq!(row.raw_payload["id"], "oura-night-1");
}

#[tokio::test]
async fn withings_nested_payload_ingests_end_to_end() {
    let (pipeline, store) = memory_pipeline();
    let report = pipeline
        .ingest(SleepSource::Withings, withings_payload())
        .await
        .expect("ingest");
    assert_eq!(report.records_created, 1);

    let rows = store.timeline(None, None).await.expect("timeline");
    let row = &rows[0];
    assert_eq!(row.source, SleepSource::Withings);
    assert_eq!(row.source_record_id, "2075648291");
    assert_eq!(row.total_sleep_minutes, Some(410));
    assert_eq!(row.sleep_onset.expect("onset").timestamp(), 1_717_973_700);
    assert_eq!(row.extra.get("night_events"), Some(&json!({"1": 2})));
}

#[tokio::test]
async fn payload_is_stored_raw_before_mapping_even_when_mapping_fails() {
    let (pipeline, store) = memory_pipeline();
    let malformed = json!({ "entries": [] });

    let report = pipeline
        .ingest(SleepSource::Oura, malformed.clone())
        .await
        .expect("ingest");
    assert_eq!(report.records_quarantined, 1);
    assert_eq!(report.records_created, 0);

    // Bronze layer got the payload anyway.
    let raw = store
        .list_by_source(SleepSource::Oura)
        .await
        .expect("list raw");
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].payload, malformed);

    let quarantined = store.list().await.expect("quarantine");
    assert_eq!(quarantined.len(), 1);
    assert_eq!(quarantined[0].stage, PipelineStage::Mapping);
    assert_eq!(quarantined[0].fingerprint, None);
    assert_eq!(quarantined[0].violations.len(), 1);
    assert_eq!(quarantined[0].violations[0].rule, "shape");
    assert!(!quarantined[0].resolved);
}

#[tokio::test]
async fn invalid_record_is_quarantined_with_every_violation() {
    let (pipeline, store) = memory_pipeline();
    // Three independent problems; only awake present, so the stage-sum
    // rule stays out of the way.
    let payload = json!({
        "data": [{
            "id": "oura-bad-1",
            "day": "2024-06-10",
            "type": "long_sleep",
            "period": 0,
            "total_sleep_duration": 90_000,
            "awake_time": -60,
            "efficiency": 150
        }]
    });

    let report = pipeline
        .ingest(SleepSource::Oura, payload)
        .await
        .expect("ingest");
    assert_eq!(report.records_quarantined, 1);

    let quarantined = store.list().await.expect("quarantine");
    assert_eq!(quarantined[0].stage, PipelineStage::Validation);
    assert!(quarantined[0].fingerprint.is_some());
    assert_eq!(
        quarantined[0].effective_date.map(|d| d.to_string()),
        Some("2024-06-10".to_string())
    );

    let messages: Vec<&str> = quarantined[0]
        .violations
        .iter()
        .map(|v| v.message.as_str())
        .collect();
    assert_eq!(messages.len(), 3);
    assert!(messages.contains(&"sleep_duration_out_of_range"));
    assert!(messages.contains(&"negative_sleep_stage"));
    assert!(messages.contains(&"efficiency_out_of_range"));

    // Nothing reached the canonical table.
    assert!(store.timeline(None, None).await.expect("timeline").is_empty());
}

#[tokio::test]
async fn out_of_range_efficiency_ratio_is_quarantined_not_rescaled() {
    let (pipeline, store) = memory_pipeline();
    let mut payload = withings_payload();
    payload["body"]["series"][0]["data"]["sleep_efficiency"] = json!(1.2);

    let report = pipeline
        .ingest(SleepSource::Withings, payload)
        .await
        .expect("ingest");
    assert_eq!(report.records_created, 0);
    assert_eq!(report.records_quarantined, 1);

    let quarantined = store.list().await.expect("quarantine");
    assert_eq!(quarantined[0].stage, PipelineStage::Validation);
    assert!(quarantined[0]
        .violations
        .iter()
        .any(|v| v.message == "efficiency_out_of_range" && v.actual == json!(1.2)));
}

#[tokio::test]
async fn stage_sum_drift_inside_tolerance_passes_outside_fails() {
    let (pipeline, store) = memory_pipeline();

    let night = |id: &str, deep_secs: i64| {
        json!({
            "data": [{
                "id": id,
                "day": "2024-06-10",
                "type": "long_sleep",
                "period": 0,
                "total_sleep_duration": 24_000,
                "deep_sleep_duration": deep_secs,
                "light_sleep_duration": 9_000,
                "rem_sleep_duration": 3_600,
                "awake_time": 3_000
            }]
        })
    };

    // 150 + 150 + 60 + 50 = 410 against 400 total: 2.5% drift.
    let report = pipeline
        .ingest(SleepSource::Oura, night("in-tolerance", 9_000))
        .await
        .expect("ingest");
    assert_eq!(report.records_created, 1);

    // 200 + 150 + 60 + 50 = 460 against 400 total: 15% drift.
    let report = pipeline
        .ingest(SleepSource::Oura, night("out-of-tolerance", 12_000))
        .await
        .expect("ingest");
    assert_eq!(report.records_quarantined, 1);

    let quarantined = store.list().await.expect("quarantine");
    assert_eq!(quarantined.len(), 1);
    assert_eq!(quarantined[0].violations[0].rule, "consistency");
}

#[tokio::test]
async fn reversed_sleep_window_is_quarantined() {
    let (pipeline, store) = memory_pipeline();
    let payload = json!({
        "data": [{
            "id": "oura-reversed",
            "day": "2024-06-10",
            "type": "long_sleep",
            "period": 0,
            "bedtime_start": "2024-06-10T07:18:54-06:00",
            "bedtime_end": "2024-06-09T23:04:12-06:00"
        }]
    });

    let report = pipeline
        .ingest(SleepSource::Oura, payload)
        .await
        .expect("ingest");
    assert_eq!(report.records_quarantined, 1);

    let quarantined = store.list().await.expect("quarantine");
    assert_eq!(quarantined[0].violations[0].rule, "ordering");
    assert_eq!(quarantined[0].violations[0].message, "bedtime_order_invalid");
}

#[tokio::test]
async fn validation_tolerance_is_injected_not_hardcoded() {
    let store = Arc::new(MemoryStore::new());
    let strict = ValidationConfig {
        stage_sum_tolerance: 0.01,
        ..ValidationConfig::default()
    };
    let pipeline =
        IngestPipeline::with_validation(store.clone(), store.clone(), store.clone(), strict);

    // 2.5% drift: fine under the default 5%, rejected under 1%.
    let payload = json!({
        "data": [{
            "id": "oura-strict",
            "day": "2024-06-10",
            "type": "long_sleep",
            "period": 0,
            "total_sleep_duration": 24_000,
            "deep_sleep_duration": 9_000,
            "light_sleep_duration": 9_000,
            "rem_sleep_duration": 3_600,
            "awake_time": 3_000
        }]
    });
    let report = pipeline
        .ingest(SleepSource::Oura, payload)
        .await
        .expect("ingest");
    assert_eq!(report.records_quarantined, 1);
}

#[tokio::test]
async fn replay_converges_to_a_single_canonical_row() {
    let (pipeline, store) = memory_pipeline();
    pipeline
        .ingest(SleepSource::Oura, oura_payload())
        .await
        .expect("ingest");

    let stats = pipeline.replay(SleepSource::Oura).await.expect("replay");
    assert_eq!(stats.payloads_replayed, 1);
    assert_eq!(stats.records_created, 0);
    assert_eq!(stats.records_deduplicated, 1);
    assert_eq!(stats.records_quarantined, 0);

    // Still exactly one canonical row.
    let timeline = store.timeline(None, None).await.expect("timeline");
    assert_eq!(timeline.len(), 1);
}

#[tokio::test]
async fn sources_share_the_pipeline_without_colliding() {
    let (pipeline, store) = memory_pipeline();
    pipeline
        .ingest(SleepSource::Oura, oura_payload())
        .await
        .expect("oura ingest");
    pipeline
        .ingest(SleepSource::Withings, withings_payload())
        .await
        .expect("withings ingest");

    let timeline = store.timeline(None, None).await.expect("timeline");
    assert_eq!(timeline.len(), 2);
    // Same night, different vendors: both survive.
    assert_eq!(timeline[0].effective_date, timeline[1].effective_date);
    assert_ne!(timeline[0].fingerprint, timeline[1].fingerprint);
}

#[tokio::test]
async fn redb_backend_runs_the_same_pipeline_durably() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("sleep.redb");
    let store = Arc::new(RedbStore::open(&path).expect("open"));
    let pipeline = IngestPipeline::new(store.clone(), store.clone(), store.clone());

    let first = pipeline
        .ingest(SleepSource::Oura, oura_payload())
        .await
        .expect("ingest");
    assert_eq!(first.records_created, 1);

    let second = pipeline
        .ingest(SleepSource::Oura, oura_payload())
        .await
        .expect("ingest again");
    assert_eq!(second.records_deduplicated, 1);

    drop(pipeline);
    drop(store);

    // Everything is on disk: canonical row and both bronze payloads.
    let reopened = RedbStore::open(&path).expect("reopen");
    let timeline = reopened.timeline(None, None).await.expect("timeline");
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].total_sleep_minutes, Some(420));
    let raw = reopened
        .list_by_source(SleepSource::Oura)
        .await
        .expect("raw");
    assert_eq!(raw.len(), 2);
}
