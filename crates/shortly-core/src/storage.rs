use crate::error::StorageError;
use crate::owner::OwnerId;
use crate::record::{NewRecord, Stats};
use crate::shortkey::ShortKey;
use async_trait::async_trait;
use std::collections::HashMap;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// The operation set every persistence backend implements.
///
/// Records are never removed: deletion flips a soft-delete flag, and deleted
/// records are excluded from listing, stats and URL uniqueness. Dropping a
/// returned future cancels the operation where the backend can honor it.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Inserts a new record owned by `owner`.
    ///
    /// Returns `Err(AlreadyExists)` carrying the existing key if `url` is
    /// already shortened, and `Err(KeyConflict)` if `key` is taken.
    async fn store(&self, owner: OwnerId, key: &ShortKey, url: &str) -> Result<()>;

    /// Resolves a key to its URL.
    ///
    /// Returns `Err(NotFound)` for keys never stored and `Err(Deleted)` for
    /// soft-deleted ones.
    async fn get(&self, key: &ShortKey) -> Result<String>;

    /// Returns every live record owned by `owner`, keyed by short key.
    async fn get_all(&self, owner: OwnerId) -> Result<HashMap<ShortKey, String>>;

    /// Inserts all `records` or none of them.
    ///
    /// Any key or URL collision yields `Err(BatchConflict)` and writes nothing.
    async fn batch_store(&self, owner: OwnerId, records: &[NewRecord]) -> Result<()>;

    /// Soft-deletes each key currently owned by `owner`.
    ///
    /// Keys owned by someone else, or unknown keys, are skipped silently.
    async fn batch_delete(&self, owner: OwnerId, keys: &[ShortKey]) -> Result<()>;

    /// Counts live records and their distinct owners.
    async fn stats(&self) -> Result<Stats>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Flushes pending state and releases resources. Safe to call twice.
    async fn close(&self) -> Result<()>;
}
