//! Identity fingerprint for deduplication.
//!
//! The fingerprint is the upsert key: two records with the same fingerprint
//! are the same logical night, whatever their metric values. It is a pure
//! function of the natural key, so re-mapping a stored raw payload always
//! lands on the same row.
//!
//! ```text
//! SHA-256("{source}:{source_record_id}:{YYYY-MM-DD}") -> hex
//! ```

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::sleep_day::SleepSource;

/// Compute the identity fingerprint for a `(source, record id, night)` key.
///
/// Deterministic and total; returns a 64-character hex string. Collisions
/// between equal natural keys are the dedup mechanism, not an error.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use model::{compute_fingerprint, SleepSource};
///
/// let night = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let fp = compute_fingerprint(SleepSource::Oura, "sleep-abc", night);
/// assert_eq!(fp.len(), 64);
/// assert_eq!(fp, compute_fingerprint(SleepSource::Oura, "sleep-abc", night));
/// ```
pub fn compute_fingerprint(
    source: SleepSource,
    source_record_id: &str,
    effective_date: NaiveDate,
) -> String {
    let raw = format!(
        "{}:{}:{}",
        source.as_str(),
        source_record_id,
        effective_date.format("%Y-%m-%d")
    );
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
