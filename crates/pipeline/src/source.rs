//! Data-source capability: where raw payloads come from.
//!
//! The pipeline itself only ever receives payloads; fetching them is a
//! separate, injected concern. [`FixtureDataSource`] serves payloads from
//! JSON files on disk — the development and test mode of the original
//! service. A live vendor client would implement the same trait; it is
//! chosen at construction time, never through global state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use model::SleepSource;

/// Failure to obtain a raw payload from a data source. Distinct from
/// pipeline errors: fetching happens before ingestion starts.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read payload fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("payload fixture is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Yields raw vendor payloads ready for [`IngestPipeline::ingest`]
/// (crate::IngestPipeline).
#[async_trait]
pub trait SleepDataSource: Send + Sync {
    /// The vendor whose payloads this source yields.
    fn source(&self) -> SleepSource;

    /// Fetch the next batch of raw payloads.
    async fn fetch(&self) -> Result<Vec<Value>, SourceError>;
}

/// File-backed data source: one JSON document per fixture file.
pub struct FixtureDataSource {
    source: SleepSource,
    path: PathBuf,
}

impl FixtureDataSource {
    pub fn new(source: SleepSource, path: impl AsRef<Path>) -> Self {
        Self {
            source,
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SleepDataSource for FixtureDataSource {
    fn source(&self) -> SleepSource {
        self.source
    }

    async fn fetch(&self) -> Result<Vec<Value>, SourceError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let payload: Value = serde_json::from_slice(&bytes)?;
        Ok(vec![payload])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn fixture_source_reads_one_payload_per_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{\"data\": []}}").expect("write fixture");

        let source = FixtureDataSource::new(SleepSource::Oura, file.path());
        assert_eq!(source.source(), SleepSource::Oura);

        let payloads = source.fetch().await.expect("fetch");
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].get("data").is_some());
    }

    #[tokio::test]
    async fn invalid_json_fixture_is_a_source_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not json").expect("write fixture");

        let source = FixtureDataSource::new(SleepSource::Withings, file.path());
        let err = source.fetch().await.expect_err("invalid fixture");
        assert!(matches!(err, SourceError::Json(_)));
    }
}
