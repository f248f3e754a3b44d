use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use validation::ValidationConfig;

/// Which storage backend the harmonizer runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Volatile in-memory store; everything is lost on exit.
    Memory,
    /// Durable single-file embedded database under `data_dir`.
    Redb,
}

/// Service configuration.
///
/// Loaded from an optional `harmonizer` config file, then overridden by
/// `SH__`-prefixed environment variables (e.g. `SH__STORE=redb`,
/// `SH__VALIDATION__STAGE_SUM_TOLERANCE=0.1`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarmonizerConfig {
    /// Storage backend
    #[serde(default = "default_store")]
    pub store: StoreKind,

    /// Directory holding the redb database file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log filter, `tracing_subscriber::EnvFilter` syntax
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Path to the Oura fixture payload
    #[serde(default = "default_oura_fixture")]
    pub oura_fixture: PathBuf,

    /// Path to the Withings fixture payload
    #[serde(default = "default_withings_fixture")]
    pub withings_fixture: PathBuf,

    /// Validation knobs, passed through to the pipeline
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl Default for HarmonizerConfig {
    fn default() -> Self {
        Self {
            store: default_store(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            oura_fixture: default_oura_fixture(),
            withings_fixture: default_withings_fixture(),
            validation: ValidationConfig::default(),
        }
    }
}

impl HarmonizerConfig {
    /// Load configuration from an optional config file and the environment.
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("harmonizer").required(false))
            .add_source(
                config::Environment::with_prefix("SH")
                    .prefix_separator("__")
                    .separator("__"),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Database file path for the redb backend.
    pub fn redb_path(&self) -> PathBuf {
        self.data_dir.join("sleep.redb")
    }

    /// Fixture path for a given source.
    pub fn fixture_path(&self, source: model::SleepSource) -> &Path {
        match source {
            model::SleepSource::Oura => &self.oura_fixture,
            model::SleepSource::Withings => &self.withings_fixture,
        }
    }
}

fn default_store() -> StoreKind {
    StoreKind::Memory
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_oura_fixture() -> PathBuf {
    PathBuf::from("fixtures/oura_sleep.json")
}

fn default_withings_fixture() -> PathBuf {
    PathBuf::from("fixtures/withings_sleep.json")
}
