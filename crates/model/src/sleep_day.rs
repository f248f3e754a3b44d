use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Vendors the harmonizer understands.
///
/// The set is closed on purpose: a source string that does not parse into
/// this enum is rejected at the boundary, before any record is built, so
/// the rest of the pipeline never sees an unrecognized source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepSource {
    Oura,
    Withings,
}

impl SleepSource {
    /// Wire name of the source, as it appears in fingerprints and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepSource::Oura => "oura",
            SleepSource::Withings => "withings",
        }
    }

    /// All supported sources, in a stable order.
    pub fn all() -> &'static [SleepSource] {
        &[SleepSource::Oura, SleepSource::Withings]
    }
}

impl fmt::Display for SleepSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a source string names no supported vendor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown sleep source `{0}`; expected one of: oura, withings")]
pub struct UnknownSourceError(pub String);

impl FromStr for SleepSource {
    type Err = UnknownSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oura" => Ok(SleepSource::Oura),
            "withings" => Ok(SleepSource::Withings),
            other => Err(UnknownSourceError(other.to_string())),
        }
    }
}

/// Canonical representation of one night's sleep from one vendor.
///
/// Constructed only by vendor mappers; mutated only by fingerprint-keyed
/// upserts (last write wins on the full metric set); never deleted by the
/// pipeline.
///
/// Timestamps are `DateTime<FixedOffset>`, so a canonical record cannot
/// carry a naive instant: vendor timestamps without zone information fail
/// during mapping instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepDay {
    /// Storage identity, assigned at first insert and stable across upserts.
    pub id: Uuid,

    // Provenance
    pub source: SleepSource,
    /// The vendor's native identifier for this record.
    pub source_record_id: String,
    /// Verbatim copy of the vendor entry this record was mapped from.
    pub raw_payload: Value,
    /// SHA-256 identity hash; see [`compute_fingerprint`](crate::compute_fingerprint).
    pub fingerprint: String,
    pub ingested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Temporal
    /// The vendor's local "night of" calendar date.
    pub effective_date: NaiveDate,

    // Metrics. None = the vendor did not report it.
    pub total_sleep_minutes: Option<i64>,
    pub deep_sleep_minutes: Option<i64>,
    pub light_sleep_minutes: Option<i64>,
    pub rem_sleep_minutes: Option<i64>,
    pub awake_minutes: Option<i64>,
    pub sleep_onset: Option<DateTime<FixedOffset>>,
    pub sleep_offset: Option<DateTime<FixedOffset>>,
    /// Normalized to [0.0, 1.0] regardless of the vendor's scale.
    pub sleep_efficiency: Option<f64>,

    /// Vendor fields with no canonical slot, keyed by their original names.
    #[serde(default)]
    pub extra: Map<String, Value>,
}
