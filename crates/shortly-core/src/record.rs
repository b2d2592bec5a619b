use crate::owner::OwnerId;
use crate::shortkey::ShortKey;
use serde::{Deserialize, Serialize};

/// A stored mapping from a short key to its original URL.
///
/// Only `deleted` changes after creation, and only from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The user that shortened the URL.
    pub owner_id: OwnerId,
    /// The short key.
    pub key: ShortKey,
    /// The original URL that was shortened.
    pub original_url: String,
    /// Soft-delete flag.
    #[serde(default)]
    pub deleted: bool,
}

impl Record {
    pub fn new(owner_id: OwnerId, key: ShortKey, original_url: impl Into<String>) -> Self {
        Self {
            owner_id,
            key,
            original_url: original_url.into(),
            deleted: false,
        }
    }

    /// Returns true if the record takes part in lookups and uniqueness checks.
    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// A record to be inserted by a batch store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub key: ShortKey,
    pub original_url: String,
}

/// Aggregate counters over live records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of non-deleted records.
    pub urls: u64,
    /// Number of distinct owners among non-deleted records.
    pub users: u64,
}
