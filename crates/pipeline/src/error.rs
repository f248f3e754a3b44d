//! Pipeline error surface.
//!
//! Only infrastructure failures escape `ingest` as errors. Malformed
//! vendor data is an expected condition and comes back as a `Quarantined`
//! outcome instead.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A storage capability (repository, bronze store, quarantine sink)
    /// failed. Not retried here; the caller owns retry policy.
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}
