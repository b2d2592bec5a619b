use crate::Generator;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shortly_core::shortkey::{ALPHABET, KEY_LENGTH};
use shortly_core::ShortKey;

/// Draws keys uniformly from `[a-z0-9]^8`.
///
/// The generator owns its RNG; nothing is shared through global state.
/// Seed it once at startup with [`RandomGenerator::from_entropy`], or with
/// [`RandomGenerator::seeded`] for a reproducible key sequence.
#[derive(Debug)]
pub struct RandomGenerator<R = StdRng> {
    rng: Mutex<R>,
}

impl RandomGenerator<StdRng> {
    /// Creates a generator seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates a generator with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send + 'static> RandomGenerator<R> {
    /// Wraps an already seeded RNG.
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn next_key(&self) -> ShortKey {
        let mut rng = self.rng.lock();
        let key: String = (0..KEY_LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        ShortKey::new_unchecked(key)
    }
}

impl<R: Rng + Send + 'static> Generator for RandomGenerator<R> {
    type Output = ShortKey;

    fn generate(&self) -> Self::Output {
        self.next_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_have_fixed_length_and_alphabet() {
        let generator = RandomGenerator::from_entropy();

        for _ in 0..1_000 {
            let key = generator.generate();
            assert_eq!(key.as_str().len(), KEY_LENGTH);
            assert!(key.as_str().bytes().all(ShortKey::is_key_byte));
            assert!(ShortKey::new(key.as_str()).is_ok());
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let first = RandomGenerator::seeded(42);
        let second = RandomGenerator::seeded(42);

        for _ in 0..16 {
            assert_eq!(first.generate(), second.generate());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let first = RandomGenerator::seeded(1);
        let second = RandomGenerator::seeded(2);

        let a: Vec<_> = (0..4).map(|_| first.generate()).collect();
        let b: Vec<_> = (0..4).map(|_| second.generate()).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn keys_rarely_repeat() {
        let generator = RandomGenerator::seeded(7);
        let keys: HashSet<_> = (0..10_000).map(|_| generator.generate()).collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn every_alphabet_character_shows_up() {
        let generator = RandomGenerator::seeded(99);
        let seen: HashSet<u8> = (0..2_000)
            .flat_map(|_| generator.generate().as_str().bytes().collect::<Vec<_>>())
            .collect();
        assert_eq!(seen.len(), ALPHABET.len());
    }

    #[test]
    fn generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RandomGenerator>();
    }
}
