//! Mapping failures.
//!
//! A `MapError` means the vendor payload violated the mapper's
//! preconditions. It is an expected, recoverable condition: the pipeline
//! turns it into a quarantine record, never into a caller-visible error.
//! Each variant carries the offending field and value so the quarantine
//! entry is fully diagnostic.

use serde_json::Value;
use thiserror::Error;

/// Why a vendor payload could not be mapped into the canonical model.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MapError {
    /// A required identity field (`id`, `day`, `date`, ...) is absent.
    #[error("required field `{field}` is missing")]
    MissingField { field: &'static str },

    /// A date field is not a `YYYY-MM-DD` calendar date.
    #[error("field `{field}` is not a valid calendar date: {value}")]
    InvalidDate { field: &'static str, value: String },

    /// A timestamp field could not be parsed at all.
    #[error("field `{field}` is not a valid timestamp: {value}")]
    InvalidTimestamp { field: &'static str, value: String },

    /// A timestamp parsed, but carries no timezone offset. Naive instants
    /// are not representable in the canonical model.
    #[error("field `{field}` is a naive timestamp without timezone: {value}")]
    NaiveTimestamp { field: &'static str, value: String },

    /// An IANA zone name the timezone database does not know.
    #[error("field `{field}` names an unknown timezone: {value}")]
    UnknownTimezone { field: &'static str, value: String },

    /// The payload does not have the shape the vendor documents. Mappers
    /// fail closed on anything unexpected rather than coercing.
    #[error("field `{field}` has an unexpected shape: {detail}")]
    UnexpectedShape {
        field: &'static str,
        detail: String,
    },
}

impl MapError {
    /// The payload field the failure is about.
    pub fn field(&self) -> &'static str {
        match self {
            MapError::MissingField { field }
            | MapError::InvalidDate { field, .. }
            | MapError::InvalidTimestamp { field, .. }
            | MapError::NaiveTimestamp { field, .. }
            | MapError::UnknownTimezone { field, .. }
            | MapError::UnexpectedShape { field, .. } => field,
        }
    }

    /// Rule identifier for the quarantine taxonomy. Shared with the
    /// validation engine's vocabulary so quarantine entries read the same
    /// whichever stage produced them.
    pub fn rule(&self) -> &'static str {
        match self {
            MapError::MissingField { .. } => "required",
            MapError::InvalidDate { .. } => "date_format",
            MapError::InvalidTimestamp { .. } => "timestamp_format",
            MapError::NaiveTimestamp { .. } => "timezone",
            MapError::UnknownTimezone { .. } => "timezone",
            MapError::UnexpectedShape { .. } => "shape",
        }
    }

    /// The offending value, for the quarantine record.
    pub fn actual(&self) -> Value {
        match self {
            MapError::MissingField { .. } => Value::Null,
            MapError::InvalidDate { value, .. }
            | MapError::InvalidTimestamp { value, .. }
            | MapError::NaiveTimestamp { value, .. }
            | MapError::UnknownTimezone { value, .. } => Value::String(value.clone()),
            MapError::UnexpectedShape { detail, .. } => Value::String(detail.clone()),
        }
    }
}
