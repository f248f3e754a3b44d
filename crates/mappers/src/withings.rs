//! Withings Sleep V2 `getsummary` mapper.
//!
//! Key differences from Oura:
//!
//! - the series sits under `body.series` (the `status`/`body` envelope may
//!   already be stripped by the transport; both shapes are accepted)
//! - timestamps are Unix epoch seconds, interpreted in the entry-level IANA
//!   `timezone` so the wearer's local moment survives
//! - metric fields are nested inside each entry's `data` object
//! - `sleep_efficiency` is already a 0.0-1.0 ratio
//! - some entries have no `id`; `{startdate}_{enddate}` is the fallback
//!   native identifier
//! - `night_events` may arrive as a JSON string and is parsed when possible

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use model::{compute_fingerprint, SleepDay, SleepSource};

use crate::convert::{epoch_to_instant, parse_date, parse_zone, secs_to_minutes, value_as_id};
use crate::error::MapError;
use crate::{opt_f64, opt_i64, SleepMapper};

/// Entry-level fields with a canonical slot (or acting as the container).
const PROMOTED_ENTRY: &[&str] = &["id", "date", "startdate", "enddate", "data"];

/// `data`-level fields with a typed canonical slot.
const PROMOTED_DATA: &[&str] = &[
    "total_sleep_time",
    "deepsleepduration",
    "lightsleepduration",
    "remsleepduration",
    "wakeupduration",
    "sleep_efficiency",
];

pub struct WithingsMapper;

impl SleepMapper for WithingsMapper {
    fn source(&self) -> SleepSource {
        SleepSource::Withings
    }

    fn map(&self, raw: &Value, now: DateTime<Utc>) -> Result<Vec<SleepDay>, MapError> {
        let body = raw.get("body").unwrap_or(raw);
        let series = body
            .get("series")
            .and_then(Value::as_array)
            .ok_or_else(|| MapError::UnexpectedShape {
                field: "series",
                detail: "expected a `body.series` array of sleep summaries".to_string(),
            })?;

        let mut records = Vec::with_capacity(series.len());
        for entry in series {
            let obj = entry.as_object().ok_or_else(|| MapError::UnexpectedShape {
                field: "series",
                detail: "series entry is not an object".to_string(),
            })?;
            // Older exports inline the metrics on the entry itself.
            let (data, inline) = match obj.get("data") {
                Some(Value::Object(data)) => (data, false),
                Some(_) => {
                    return Err(MapError::UnexpectedShape {
                        field: "data",
                        detail: "entry `data` is not an object".to_string(),
                    })
                }
                None => (obj, true),
            };

            let date = obj
                .get("date")
                .and_then(Value::as_str)
                .ok_or(MapError::MissingField { field: "date" })?;
            let effective_date = parse_date("date", date)?;

            let start_epoch = opt_i64(obj, "startdate")?;
            let end_epoch = opt_i64(obj, "enddate")?;

            // Native id, falling back to the sleep window endpoints.
            let source_record_id = match obj.get("id").and_then(value_as_id) {
                Some(id) => id,
                None => match (start_epoch, end_epoch) {
                    (Some(start), Some(end)) => format!("{start}_{end}"),
                    _ => return Err(MapError::MissingField { field: "id" }),
                },
            };

            let zone = obj
                .get("timezone")
                .and_then(Value::as_str)
                .map(|name| parse_zone("timezone", name))
                .transpose()?;
            let sleep_onset = start_epoch
                .map(|s| epoch_to_instant("startdate", s, zone))
                .transpose()?;
            let sleep_offset = end_epoch
                .map(|s| epoch_to_instant("enddate", s, zone))
                .transpose()?;

            let mut extra = Map::new();
            for (key, value) in obj {
                if PROMOTED_ENTRY.contains(&key.as_str()) {
                    continue;
                }
                if inline && PROMOTED_DATA.contains(&key.as_str()) {
                    continue;
                }
                extra.insert(key.clone(), value.clone());
            }
            // data-level overflow; the original vendor keys are kept.
            if !inline {
                for (key, value) in data {
                    if !PROMOTED_DATA.contains(&key.as_str()) {
                        extra.insert(key.clone(), value.clone());
                    }
                }
            }
            parse_night_events(&mut extra);

            debug!(
                source_record_id = %source_record_id,
                date = %effective_date,
                "mapped withings sleep summary"
            );

            records.push(SleepDay {
                id: Uuid::new_v4(),
                source: SleepSource::Withings,
                source_record_id: source_record_id.clone(),
                raw_payload: entry.clone(),
                fingerprint: compute_fingerprint(
                    SleepSource::Withings,
                    &source_record_id,
                    effective_date,
                ),
                ingested_at: now,
                updated_at: now,
                effective_date,
                total_sleep_minutes: secs_to_minutes(opt_i64(data, "total_sleep_time")?),
                deep_sleep_minutes: secs_to_minutes(opt_i64(data, "deepsleepduration")?),
                light_sleep_minutes: secs_to_minutes(opt_i64(data, "lightsleepduration")?),
                rem_sleep_minutes: secs_to_minutes(opt_i64(data, "remsleepduration")?),
                awake_minutes: secs_to_minutes(opt_i64(data, "wakeupduration")?),
                sleep_onset,
                sleep_offset,
                // Already a 0.0-1.0 ratio; passed through untouched so the
                // validation engine sees out-of-range values as reported.
                sleep_efficiency: opt_f64(data, "sleep_efficiency")?,
                extra,
            });
        }

        Ok(records)
    }
}

/// `night_events` sometimes arrives double-encoded as a JSON string; replace
/// it with the parsed value when it decodes, otherwise leave it verbatim.
fn parse_night_events(extra: &mut Map<String, Value>) {
    if let Some(Value::String(raw)) = extra.get("night_events") {
        if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
            extra.insert("night_events".to_string(), parsed);
        }
    }
}
