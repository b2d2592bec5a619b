//! Core types and traits for the shortly URL shortener.
//!
//! This crate holds the data model shared by the storage engines and the
//! shortener service: short keys, owners, records, the [`Storage`] contract
//! and the [`Shortener`] facade consumed by transport adapters.

pub mod error;
pub mod owner;
pub mod record;
pub mod shortener;
pub mod shortkey;
pub mod storage;

pub use error::{CoreError, ShortenerError, StorageError};
pub use owner::OwnerId;
pub use record::{NewRecord, Record, Stats};
pub use shortener::{BatchShortenRequest, BatchShortenResponse, ShortenOutcome, Shortener};
pub use shortkey::ShortKey;
pub use storage::Storage;
