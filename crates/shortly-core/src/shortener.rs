use crate::error::ShortenerError;
use crate::owner::OwnerId;
use crate::record::Stats;
use crate::shortkey::ShortKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

type Result<T> = std::result::Result<T, ShortenerError>;

/// Outcome of a successful shorten call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenOutcome {
    /// A new record was created under this key.
    Created(ShortKey),
    /// The URL was already shortened; this is the existing key.
    Existing(ShortKey),
}

impl ShortenOutcome {
    pub fn key(&self) -> &ShortKey {
        match self {
            ShortenOutcome::Created(key) | ShortenOutcome::Existing(key) => key,
        }
    }

    pub fn into_key(self) -> ShortKey {
        match self {
            ShortenOutcome::Created(key) | ShortenOutcome::Existing(key) => key,
        }
    }

    pub fn already_existed(&self) -> bool {
        matches!(self, ShortenOutcome::Existing(_))
    }
}

/// One element of a batch shorten request.
///
/// The correlation id is echoed back and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchShortenRequest {
    pub correlation_id: String,
    pub original_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchShortenResponse {
    pub correlation_id: String,
    pub key: ShortKey,
}

/// The operations transport adapters call.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `url` on behalf of `owner`.
    async fn shorten(&self, owner: OwnerId, url: &str) -> Result<ShortenOutcome>;

    /// Resolves a short key to its original URL.
    async fn decode(&self, key: &ShortKey) -> Result<String>;

    /// Shortens every URL in `requests` atomically.
    async fn batch_shorten(
        &self,
        owner: OwnerId,
        requests: Vec<BatchShortenRequest>,
    ) -> Result<Vec<BatchShortenResponse>>;

    /// Lists live records created by `owner`.
    async fn list_owned(&self, owner: OwnerId) -> Result<HashMap<ShortKey, String>>;

    /// Schedules `keys` for deletion. Deletion becomes visible asynchronously.
    async fn batch_delete(&self, owner: OwnerId, keys: Vec<ShortKey>) -> Result<()>;

    async fn stats(&self) -> Result<Stats>;

    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_reports_existing() {
        let key = ShortKey::new_unchecked("abcd1234");

        let created = ShortenOutcome::Created(key.clone());
        assert!(!created.already_existed());

        let existing = ShortenOutcome::Existing(key.clone());
        assert!(existing.already_existed());
        assert_eq!(existing.into_key(), key);
    }
}
