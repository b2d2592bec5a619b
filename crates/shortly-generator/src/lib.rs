pub mod random;
pub mod seq;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

use shortly_core::ShortKey;

/// Trait for generating short keys.
///
/// Implementations are pure generators that don't interact with storage:
/// uniqueness is enforced by the caller, which probes the store and asks
/// for another key on collision.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortKey>;

    /// Generates a candidate key.
    fn generate(&self) -> Self::Output;
}
