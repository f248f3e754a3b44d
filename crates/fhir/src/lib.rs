//! FHIR R4 Observation output transform.
//!
//! Renders a canonical [`SleepDay`] as a FHIR R4 `Observation` with
//! LOINC-coded components. This is an output format only; the canonical
//! model stays the source of truth and nothing here is read back.
//!
//! Shape decisions:
//! - `category` is `activity` (wearable-generated wellness data)
//! - `effective[x]` is a FHIR choice type: `effectivePeriod` when both
//!   onset and offset are known, otherwise `effectiveDateTime` with the
//!   effective date
//! - one `component` per populated metric; absent metrics are omitted,
//!   never rendered as null
//! - sleep efficiency and awake duration have no standard LOINC code, so
//!   they use text-only codes

use chrono::SecondsFormat;
use serde_json::{json, Map, Value};

use model::SleepDay;

pub const LOINC_SYSTEM: &str = "http://loinc.org";
pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";

const CATEGORY_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/observation-category";
const IDENTIFIER_URN_PREFIX: &str = "urn:sleep-harmonizer";

/// LOINC codes for the sleep-stage duration metrics.
const SLEEP_LOINC: &[(&str, &str, fn(&SleepDay) -> Option<i64>)] = &[
    ("93832-4", "Sleep duration", |d| d.total_sleep_minutes),
    ("93831-6", "Deep sleep duration", |d| d.deep_sleep_minutes),
    ("93830-8", "Light sleep duration", |d| d.light_sleep_minutes),
    ("93829-0", "REM sleep duration", |d| d.rem_sleep_minutes),
];

fn minutes_quantity(value: i64) -> Value {
    json!({
        "value": value,
        "unit": "min",
        "system": UCUM_SYSTEM,
        "code": "min",
    })
}

fn coded_component(code: &str, display: &str, value: i64) -> Value {
    json!({
        "code": {
            "coding": [{
                "system": LOINC_SYSTEM,
                "code": code,
                "display": display,
            }]
        },
        "valueQuantity": minutes_quantity(value),
    })
}

/// Render one canonical sleep record as a FHIR R4 Observation.
pub fn to_observation(record: &SleepDay) -> Value {
    let mut observation = Map::new();
    observation.insert("resourceType".into(), json!("Observation"));
    observation.insert("id".into(), json!(record.id.to_string()));
    observation.insert(
        "meta".into(),
        json!({ "lastUpdated": record.updated_at.to_rfc3339_opts(SecondsFormat::Secs, false) }),
    );
    observation.insert(
        "identifier".into(),
        json!([
            {
                "system": format!("{IDENTIFIER_URN_PREFIX}:{}", record.source.as_str()),
                "value": record.source_record_id,
            },
            {
                "system": format!("{IDENTIFIER_URN_PREFIX}:fingerprint"),
                "value": record.fingerprint,
            },
        ]),
    );
    observation.insert("status".into(), json!("final"));
    observation.insert(
        "category".into(),
        json!([{
            "coding": [{
                "system": CATEGORY_SYSTEM,
                "code": "activity",
                "display": "Activity",
            }]
        }]),
    );
    observation.insert(
        "code".into(),
        json!({
            "coding": [{
                "system": LOINC_SYSTEM,
                "code": "93832-4",
                "display": "Sleep duration",
            }],
            "text": "Sleep observation from wearable device",
        }),
    );

    // effective[x]: exactly one form.
    match (record.sleep_onset, record.sleep_offset) {
        (Some(onset), Some(offset)) => {
            observation.insert(
                "effectivePeriod".into(),
                json!({
                    "start": onset.to_rfc3339_opts(SecondsFormat::Secs, false),
                    "end": offset.to_rfc3339_opts(SecondsFormat::Secs, false),
                }),
            );
        }
        _ => {
            observation.insert(
                "effectiveDateTime".into(),
                json!(record.effective_date.format("%Y-%m-%d").to_string()),
            );
        }
    }

    observation.insert(
        "issued".into(),
        json!(record.ingested_at.to_rfc3339_opts(SecondsFormat::Secs, false)),
    );

    let mut components = Vec::new();
    for (code, display, getter) in SLEEP_LOINC {
        if let Some(value) = getter(record) {
            components.push(coded_component(code, display, value));
        }
    }
    if let Some(efficiency) = record.sleep_efficiency {
        let rounded = (efficiency * 10_000.0).round() / 10_000.0;
        components.push(json!({
            "code": { "text": "Sleep efficiency" },
            "valueQuantity": {
                "value": rounded,
                "unit": "ratio",
                "system": UCUM_SYSTEM,
                "code": "{ratio}",
            },
        }));
    }
    if let Some(awake) = record.awake_minutes {
        components.push(json!({
            "code": { "text": "Awake duration during sleep" },
            "valueQuantity": minutes_quantity(awake),
        }));
    }
    observation.insert("component".into(), Value::Array(components));

    observation.insert(
        "device".into(),
        json!({ "display": format!("{} wearable", record.source.as_str()) }),
    );

    Value::Object(observation)
}
