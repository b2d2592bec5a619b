use crate::aggregator::{AggregatorSettings, DeleteAggregator};
use async_trait::async_trait;
use shortly_core::{
    BatchShortenRequest, BatchShortenResponse, NewRecord, OwnerId, ShortKey, ShortenOutcome,
    Shortener, ShortenerError, Stats, Storage, StorageError,
};
use shortly_generator::Generator;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;
use url::Url;

type Result<T> = std::result::Result<T, ShortenerError>;

const DEFAULT_MAX_KEY_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceSettings {
    /// How many fresh keys `shorten` tries before giving up.
    #[builder(default = DEFAULT_MAX_KEY_ATTEMPTS)]
    pub max_key_attempts: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A concrete implementation of the [`Shortener`] trait.
///
/// This service wraps a [`Storage`] and a [`Generator`] to handle:
/// - URL validation
/// - key generation, retrying when a key is already taken
/// - handing deletions to a [`DeleteAggregator`]
///
/// Lookups, listings and stats go straight to storage.
pub struct ShortenerService<S, G> {
    storage: Arc<S>,
    generator: Arc<G>,
    deleter: DeleteAggregator,
    settings: ServiceSettings,
}

impl<S: Storage, G: Generator> ShortenerService<S, G> {
    /// Creates a service and starts its delete aggregator on the current runtime.
    pub fn new(storage: Arc<S>, generator: G, aggregator: AggregatorSettings) -> Self {
        Self::with_settings(storage, generator, aggregator, ServiceSettings::default())
    }

    pub fn with_settings(
        storage: Arc<S>,
        generator: G,
        aggregator: AggregatorSettings,
        settings: ServiceSettings,
    ) -> Self {
        let deleter = DeleteAggregator::spawn(Arc::clone(&storage), aggregator);
        Self {
            storage,
            generator: Arc::new(generator),
            deleter,
            settings,
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Writes every delete submitted so far to storage.
    pub async fn flush_deletes(&self) -> Result<()> {
        self.deleter.flush().await
    }

    /// Flushes pending deletes, then closes storage.
    ///
    /// Deletes submitted afterwards fail with [`ShortenerError::AggregatorClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        self.deleter.shutdown().await;
        self.storage.close().await?;
        Ok(())
    }

    fn attempts(&self) -> usize {
        self.settings.max_key_attempts.max(1)
    }

    fn generate_key(&self) -> ShortKey {
        self.generator.generate().into()
    }
}

/// Checks that `raw` parses as a URL with a scheme and a host.
fn validate_url(raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| ShortenerError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(ShortenerError::InvalidUrl(format!(
            "URL must have a scheme and a host: {raw}"
        ))),
    }
}

#[async_trait]
impl<S: Storage, G: Generator> Shortener for ShortenerService<S, G> {
    async fn shorten(&self, owner: OwnerId, url: &str) -> Result<ShortenOutcome> {
        validate_url(url)?;

        let attempts = self.attempts();
        for attempt in 1..=attempts {
            let key = self.generate_key();
            match self.storage.store(owner, &key, url).await {
                Ok(()) => {
                    debug!(owner = %owner, key = %key, "shortened url");
                    return Ok(ShortenOutcome::Created(key));
                }
                Err(StorageError::AlreadyExists { existing_key, .. }) => {
                    debug!(owner = %owner, key = %existing_key, "url already shortened");
                    return Ok(ShortenOutcome::Existing(existing_key));
                }
                Err(StorageError::KeyConflict(_)) => {
                    trace!(key = %key, attempt, "key taken, generating another");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ShortenerError::KeySpaceExhausted { attempts })
    }

    async fn decode(&self, key: &ShortKey) -> Result<String> {
        Ok(self.storage.get(key).await?)
    }

    async fn batch_shorten(
        &self,
        owner: OwnerId,
        requests: Vec<BatchShortenRequest>,
    ) -> Result<Vec<BatchShortenResponse>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        for request in &requests {
            validate_url(&request.original_url)?;
        }

        // keys must be distinct within the batch, or storage rejects all of it
        let attempts = self.attempts();
        let mut seen = HashSet::with_capacity(requests.len());
        let mut records = Vec::with_capacity(requests.len());
        for request in &requests {
            let key = (0..attempts)
                .map(|_| self.generate_key())
                .find(|key| seen.insert(key.clone()))
                .ok_or(ShortenerError::KeySpaceExhausted { attempts })?;

            records.push(NewRecord {
                key,
                original_url: request.original_url.clone(),
            });
        }

        self.storage.batch_store(owner, &records).await?;
        debug!(owner = %owner, count = records.len(), "shortened batch");

        Ok(requests
            .into_iter()
            .zip(records)
            .map(|(request, record)| BatchShortenResponse {
                correlation_id: request.correlation_id,
                key: record.key,
            })
            .collect())
    }

    async fn list_owned(&self, owner: OwnerId) -> Result<HashMap<ShortKey, String>> {
        Ok(self.storage.get_all(owner).await?)
    }

    async fn batch_delete(&self, owner: OwnerId, keys: Vec<ShortKey>) -> Result<()> {
        self.deleter.submit(owner, keys).await
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.storage.stats().await?)
    }

    async fn ping(&self) -> Result<()> {
        Ok(self.storage.ping().await?)
    }
}
