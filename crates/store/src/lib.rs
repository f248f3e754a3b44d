//! Storage backends implementing the pipeline's capability traits.
//!
//! Two backends, one contract:
//!
//! - [`MemoryStore`] — `RwLock`-protected maps; the default for tests and
//!   ephemeral runs.
//! - [`RedbStore`] — durable, ACID, pure-Rust embedded database; one redb
//!   write transaction per operation, run under `spawn_blocking` so the
//!   async pipeline never blocks a runtime worker on disk I/O.
//!
//! Both implement the same upsert semantics: the fingerprint is the key,
//! an update preserves the row id and the original `ingested_at`, and the
//! whole metric/provenance set is overwritten (last write wins).

mod memory;
mod redb_store;

pub use crate::memory::MemoryStore;
pub use crate::redb_store::RedbStore;

use model::SleepDay;

/// Merge an incoming record over the stored row with the same fingerprint.
///
/// Identity and first-ingest provenance survive; everything else is the
/// incoming record's.
fn merge_existing(mut incoming: SleepDay, existing: &SleepDay) -> SleepDay {
    incoming.id = existing.id;
    incoming.ingested_at = existing.ingested_at;
    incoming
}
