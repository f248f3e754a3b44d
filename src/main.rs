use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sleep_harmonizer::{
    to_observation, FixtureDataSource, HarmonizerConfig, IngestPipeline, MemoryStore,
    RedbStore, SleepDataSource, SleepSource, StoreKind,
};

use pipeline::store::{QuarantineSink, RawResponseStore, SleepRepository};

/// The three storage capabilities, backed by one store value.
struct Stores {
    repository: Arc<dyn SleepRepository>,
    raw: Arc<dyn RawResponseStore>,
    quarantine: Arc<dyn QuarantineSink>,
}

fn build_stores(config: &HarmonizerConfig) -> anyhow::Result<Stores> {
    match config.store {
        StoreKind::Memory => {
            let store = Arc::new(MemoryStore::new());
            Ok(Stores {
                repository: store.clone(),
                raw: store.clone(),
                quarantine: store,
            })
        }
        StoreKind::Redb => {
            std::fs::create_dir_all(&config.data_dir)
                .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
            let path = config.redb_path();
            let store = Arc::new(
                RedbStore::open(&path)
                    .with_context(|| format!("opening database {}", path.display()))?,
            );
            Ok(Stores {
                repository: store.clone(),
                raw: store.clone(),
                quarantine: store,
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = HarmonizerConfig::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!(store = ?config.store, "sleep harmonizer starting");

    let stores = build_stores(&config)?;
    let pipeline = IngestPipeline::with_validation(
        stores.repository.clone(),
        stores.raw,
        stores.quarantine,
        config.validation.clone(),
    );

    for source in SleepSource::all() {
        let fixture = config.fixture_path(*source);
        if !fixture.exists() {
            info!(source = %source, path = %fixture.display(), "fixture missing, skipping");
            continue;
        }
        let data_source = FixtureDataSource::new(*source, fixture);
        let payloads = data_source
            .fetch()
            .await
            .with_context(|| format!("fetching {source} fixture"))?;
        for payload in payloads {
            let report = pipeline.ingest(*source, payload).await?;
            println!(
                "{source}: {} processed, {} created, {} deduplicated, {} quarantined",
                report.records_processed(),
                report.records_created,
                report.records_deduplicated,
                report.records_quarantined,
            );
        }
    }

    let timeline = stores.repository.timeline(None, None).await?;
    println!("canonical records: {}", timeline.len());
    if let Some(first) = timeline.first() {
        let observation = to_observation(first);
        println!("{}", serde_json::to_string_pretty(&observation)?);
    }

    Ok(())
}
