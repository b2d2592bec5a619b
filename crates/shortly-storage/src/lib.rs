//! Storage engines implementing the [`Storage`] contract.
//!
//! - [`InMemoryStorage`] keeps records in process memory and periodically
//!   rewrites a snapshot file.
//! - [`PostgresStorage`] delegates uniqueness and atomicity to PostgreSQL.

pub mod memory;
pub mod postgres;
mod snapshot;

pub use memory::{InMemorySettings, InMemoryStorage};
pub use postgres::{PostgresSettings, PostgresStorage};
pub use shortly_core::storage::{Result, Storage};
pub use shortly_core::StorageError;
