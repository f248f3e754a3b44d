//! Oura V2 sleep response mapper.
//!
//! Translates Oura's field names, units, and conventions into the canonical
//! model:
//!
//! - durations arrive in seconds; efficiency as a 0-100 integer;
//!   `bedtime_start`/`bedtime_end` as ISO-8601 with offset
//! - only `type == "long_sleep"` entries with `period == 0` are the primary
//!   overnight session; naps and rest periods are skipped
//! - every unpromoted field is copied into `extra` under its Oura key

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use model::{compute_fingerprint, SleepDay, SleepSource};

use crate::convert::{parse_date, parse_iso_instant, pct_to_ratio, secs_to_minutes};
use crate::error::MapError;
use crate::{opt_f64, opt_i64, SleepMapper};

/// Entry fields with a typed canonical slot; everything else overflows.
const PROMOTED: &[&str] = &[
    "id",
    "day",
    "total_sleep_duration",
    "deep_sleep_duration",
    "light_sleep_duration",
    "rem_sleep_duration",
    "awake_time",
    "efficiency",
    "bedtime_start",
    "bedtime_end",
];

pub struct OuraMapper;

impl SleepMapper for OuraMapper {
    fn source(&self) -> SleepSource {
        SleepSource::Oura
    }

    fn map(&self, raw: &Value, now: DateTime<Utc>) -> Result<Vec<SleepDay>, MapError> {
        let entries = raw
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| MapError::UnexpectedShape {
                field: "data",
                detail: "expected a `data` array of sleep entries".to_string(),
            })?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let obj = entry.as_object().ok_or_else(|| MapError::UnexpectedShape {
                field: "data",
                detail: "sleep entry is not an object".to_string(),
            })?;

            // Filter: only the primary overnight session.
            let kind = obj.get("type").and_then(Value::as_str);
            let period = obj.get("period").and_then(Value::as_i64).unwrap_or(0);
            if kind != Some("long_sleep") || period != 0 {
                debug!(kind = ?kind, period, "skipping non-primary oura sleep entry");
                continue;
            }

            let source_record_id = obj
                .get("id")
                .and_then(Value::as_str)
                .ok_or(MapError::MissingField { field: "id" })?
                .to_string();
            let day = obj
                .get("day")
                .and_then(Value::as_str)
                .ok_or(MapError::MissingField { field: "day" })?;
            let effective_date = parse_date("day", day)?;

            let sleep_onset = obj
                .get("bedtime_start")
                .and_then(Value::as_str)
                .map(|s| parse_iso_instant("bedtime_start", s))
                .transpose()?;
            let sleep_offset = obj
                .get("bedtime_end")
                .and_then(Value::as_str)
                .map(|s| parse_iso_instant("bedtime_end", s))
                .transpose()?;

            let mut extra = Map::new();
            for (key, value) in obj {
                if !PROMOTED.contains(&key.as_str()) {
                    extra.insert(key.clone(), value.clone());
                }
            }

            records.push(SleepDay {
                id: Uuid::new_v4(),
                source: SleepSource::Oura,
                source_record_id: source_record_id.clone(),
                raw_payload: entry.clone(),
                fingerprint: compute_fingerprint(
                    SleepSource::Oura,
                    &source_record_id,
                    effective_date,
                ),
                ingested_at: now,
                updated_at: now,
                effective_date,
                total_sleep_minutes: secs_to_minutes(opt_i64(obj, "total_sleep_duration")?),
                deep_sleep_minutes: secs_to_minutes(opt_i64(obj, "deep_sleep_duration")?),
                light_sleep_minutes: secs_to_minutes(opt_i64(obj, "light_sleep_duration")?),
                rem_sleep_minutes: secs_to_minutes(opt_i64(obj, "rem_sleep_duration")?),
                awake_minutes: secs_to_minutes(opt_i64(obj, "awake_time")?),
                sleep_onset,
                sleep_offset,
                sleep_efficiency: opt_f64(obj, "efficiency")?.map(pct_to_ratio),
                extra,
            });
        }

        Ok(records)
    }
}
