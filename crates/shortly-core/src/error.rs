use crate::shortkey::ShortKey;
use thiserror::Error;

/// Errors raised while constructing core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short key: {0}")]
    InvalidShortKey(String),
}

/// Errors reported by a [`Storage`](crate::storage::Storage) backend.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// No record ever used this key.
    #[error("short key not found: {0}")]
    NotFound(String),
    /// The key exists but its record was soft-deleted.
    #[error("short key was deleted: {0}")]
    Deleted(String),
    /// The URL is already shortened under `existing_key`.
    ///
    /// Callers treat this as success-with-existing-key, not as a failure.
    #[error("url {url} is already shortened as {existing_key}")]
    AlreadyExists { existing_key: ShortKey, url: String },
    /// The key is already taken by another record.
    #[error("short key already in use: {0}")]
    KeyConflict(String),
    /// A key or URL in a batch collided; nothing from the batch was written.
    #[error("batch rejected: a key or url is already in use")]
    BatchConflict,
    #[error("snapshot persistence failed: {0}")]
    Persistence(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),
}

/// Errors surfaced by the shortener service to transport adapters.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short key: {0}")]
    InvalidShortKey(String),
    #[error("short key not found: {0}")]
    NotFound(String),
    #[error("short key was deleted: {0}")]
    Deleted(String),
    #[error("batch rejected: a key or url is already in use")]
    BatchConflict,
    #[error("no free short key found after {attempts} attempts")]
    KeySpaceExhausted { attempts: usize },
    #[error("delete queue is saturated")]
    DeleteQueueSaturated,
    #[error("delete aggregator is shut down")]
    AggregatorClosed,
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortKey(message) => Self::InvalidShortKey(message),
        }
    }
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(key) => Self::NotFound(key),
            StorageError::Deleted(key) => Self::Deleted(key),
            StorageError::BatchConflict => Self::BatchConflict,
            other => Self::Storage(other),
        }
    }
}
