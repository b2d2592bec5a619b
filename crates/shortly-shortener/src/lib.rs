//! URL shortener service implementation.
//!
//! This crate wires a [`Storage`](shortly_core::Storage) backend and a key
//! [`Generator`](shortly_generator::Generator) into a [`ShortenerService`],
//! and batches deletions through the [`DeleteAggregator`] actor.

pub mod aggregator;
pub mod service;

pub use aggregator::{AggregatorSettings, DeleteAggregator};
pub use service::{ServiceSettings, ShortenerService};
pub use shortly_core::{Shortener, ShortenerError};
