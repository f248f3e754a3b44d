//! Canonical sleep data model.
//!
//! Every vendor payload is translated into one shape: the [`SleepDay`]
//! record, representing a single vendor-reported night. This crate is the
//! bottom of the dependency graph — mappers construct `SleepDay` values,
//! the validation engine checks them, and the pipeline persists them.
//!
//! Design principles:
//!
//! - **Intersection-first**: only metrics every supported vendor can supply
//!   get typed fields; everything else lives in the open [`SleepDay::extra`]
//!   map under its original vendor key.
//! - **Absence is not zero**: a `None` metric means the vendor did not
//!   report it. A present `0` is a real measurement.
//! - **Provenance everywhere**: each record keeps its source, the vendor's
//!   native record id, and a verbatim copy of the raw payload it came from.
//! - **Identity by fingerprint**: the SHA-256 of
//!   `(source, source_record_id, effective_date)` decides whether two
//!   records are the same logical night. See [`compute_fingerprint`].

mod fingerprint;
mod sleep_day;

pub use crate::fingerprint::compute_fingerprint;
pub use crate::sleep_day::{SleepDay, SleepSource, UnknownSourceError};
