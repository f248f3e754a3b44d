//! Vendor anti-corruption layer.
//!
//! This is where vendor payloads enter the harmonizer. Each supported
//! vendor has one mapper that knows its field names, units, and null
//! conventions and translates a raw API response into canonical
//! [`SleepDay`] records — or fails with a structured [`MapError`] that the
//! pipeline turns into a quarantine entry.
//!
//! Mappers are pure transforms: no clock reads (the orchestrator passes
//! `now` in), no I/O, no shared state. Anything the vendor reports that has
//! no typed canonical slot is carried verbatim in [`SleepDay::extra`] under
//! its original vendor key, so no field is ever dropped.
//!
//! ```
//! use chrono::Utc;
//! use mappers::mapper_for;
//! use model::SleepSource;
//! use serde_json::json;
//!
//! let payload = json!({ "data": [{
//!     "id": "sleep-1", "day": "2024-01-15",
//!     "type": "long_sleep", "period": 0,
//!     "total_sleep_duration": 25_200
//! }]});
//! let records = mapper_for(SleepSource::Oura)
//!     .map(&payload, Utc::now())
//!     .unwrap();
//! assert_eq!(records[0].total_sleep_minutes, Some(420));
//! ```

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use model::{SleepDay, SleepSource};

mod convert;
mod error;
mod oura;
mod withings;

pub use crate::error::MapError;
pub use crate::oura::OuraMapper;
pub use crate::withings::WithingsMapper;

/// A vendor-specific translator from raw payloads to canonical records.
///
/// One payload may yield several records (one per night) or none at all
/// (every entry filtered, e.g. a payload of naps).
pub trait SleepMapper: Send + Sync {
    /// The vendor this mapper understands.
    fn source(&self) -> SleepSource;

    /// Translate a raw vendor response. `now` becomes `ingested_at` /
    /// `updated_at` on the produced records; passing it in keeps the
    /// mapper deterministic.
    fn map(&self, raw: &Value, now: DateTime<Utc>) -> Result<Vec<SleepDay>, MapError>;
}

/// Return the mapper for a source. Total: every `SleepSource` has one.
pub fn mapper_for(source: SleepSource) -> &'static dyn SleepMapper {
    match source {
        SleepSource::Oura => &OuraMapper,
        SleepSource::Withings => &WithingsMapper,
    }
}

/// Read an optional integer field, failing closed on a non-numeric value.
pub(crate) fn opt_i64(obj: &Map<String, Value>, field: &'static str) -> Result<Option<i64>, MapError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| MapError::UnexpectedShape {
            field,
            detail: format!("expected an integer, got {value}"),
        }),
    }
}

/// Read an optional numeric field, failing closed on a non-numeric value.
pub(crate) fn opt_f64(obj: &Map<String, Value>, field: &'static str) -> Result<Option<f64>, MapError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| MapError::UnexpectedShape {
            field,
            detail: format!("expected a number, got {value}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn factory_returns_the_matching_mapper() {
        for source in SleepSource::all() {
            assert_eq!(mapper_for(*source).source(), *source);
        }
    }

    #[test]
    fn numeric_accessors_fail_closed() {
        let obj = json!({"n": 5, "f": 1.5, "s": "five", "nil": null});
        let obj = obj.as_object().expect("object");

        assert_eq!(opt_i64(obj, "n").expect("integer"), Some(5));
        assert_eq!(opt_i64(obj, "missing").expect("absent"), None);
        assert_eq!(opt_i64(obj, "nil").expect("null"), None);
        assert!(opt_i64(obj, "s").is_err());

        assert_eq!(opt_f64(obj, "f").expect("number"), Some(1.5));
        assert!(opt_f64(obj, "s").is_err());
    }
}
