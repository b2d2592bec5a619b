mod cli;

use crate::cli::{Cli, Command, StorageBackendArg};
use anyhow::Context;
use clap::Parser;
use shortly_core::{BatchShortenRequest, OwnerId, ShortKey, Shortener, Storage};
use shortly_generator::RandomGenerator;
use shortly_shortener::{AggregatorSettings, ShortenerService};
use shortly_storage::{InMemorySettings, InMemoryStorage, PostgresSettings, PostgresStorage};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse();
    shortly_telemetry::init(config.log_format.into(), shortly_telemetry::DEFAULT_FILTER)?;

    let owner = match config.owner {
        Some(owner) => owner,
        None => {
            let owner = OwnerId::new_v4();
            eprintln!("owner: {owner}");
            owner
        }
    };

    info!(
        storage_backend = %config.backend(),
        owner = %owner,
        "starting shortly"
    );

    match config.backend() {
        StorageBackendArg::InMemory => {
            let settings = InMemorySettings::builder()
                .path(config.file_storage_path.clone())
                .flush_interval(config.inmem_flush_interval())
                .build();
            let storage = InMemoryStorage::open(settings)
                .await
                .with_context(|| format!("opening {}", config.file_storage_path.display()))?;
            run(Arc::new(storage), &config, owner).await
        }
        StorageBackendArg::Postgres => {
            let dsn = config
                .database_dsn
                .clone()
                .context("a database DSN is required when storage backend is postgres")?;
            let storage = PostgresStorage::connect(PostgresSettings::builder().dsn(dsn).build())
                .await
                .context("connecting to postgres")?;
            run(Arc::new(storage), &config, owner).await
        }
    }
}

/// Runs one command, then flushes deletes and closes storage in that order.
async fn run<S: Storage>(storage: Arc<S>, config: &Cli, owner: OwnerId) -> anyhow::Result<()> {
    let service = ShortenerService::new(
        storage,
        RandomGenerator::from_entropy(),
        AggregatorSettings::builder()
            .flush_interval(config.delete_flush_interval())
            .build(),
    );

    let result = execute(&service, &config.command, owner, &config.base_url).await;
    let shutdown = service.shutdown().await;

    result?;
    shutdown.context("shutting down")?;
    Ok(())
}

async fn execute<S: Shortener>(
    service: &S,
    command: &Command,
    owner: OwnerId,
    base_url: &str,
) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url } => {
            let outcome = service.shorten(owner, url).await?;
            let status = if outcome.already_existed() {
                "existing"
            } else {
                "created"
            };
            println!("{}\t{status}", outcome.key().to_url(base_url));
        }
        Command::BatchShorten { items } => {
            let requests = items
                .iter()
                .map(|(correlation_id, url)| BatchShortenRequest {
                    correlation_id: correlation_id.clone(),
                    original_url: url.clone(),
                })
                .collect();
            for response in service.batch_shorten(owner, requests).await? {
                println!("{}\t{}", response.correlation_id, response.key.to_url(base_url));
            }
        }
        Command::Decode { key } => {
            let key = ShortKey::new(key.as_str())?;
            println!("{}", service.decode(&key).await?);
        }
        Command::List => {
            let mut owned: Vec<_> = service.list_owned(owner).await?.into_iter().collect();
            owned.sort();
            for (key, url) in owned {
                println!("{}\t{url}", key.to_url(base_url));
            }
        }
        Command::Delete { keys } => {
            let keys = keys
                .iter()
                .map(|key| ShortKey::new(key.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            let count = keys.len();
            service.batch_delete(owner, keys).await?;
            println!("queued {count} keys for deletion");
        }
        Command::Stats => {
            let stats = service.stats().await?;
            println!("urls\t{}\nusers\t{}", stats.urls, stats.users);
        }
        Command::Ping => {
            service.ping().await?;
            println!("ok");
        }
    }
    Ok(())
}
