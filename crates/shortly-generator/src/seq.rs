use crate::Generator;
use shortly_core::shortkey::{ALPHABET, KEY_LENGTH};
use shortly_core::{CoreError, ShortKey};
use std::sync::atomic::{AtomicU64, Ordering};

/// A deterministic generator producing `prefix` followed by a base36 counter.
///
/// `SeqGenerator::with_prefix("wh")` yields `wh000000`, `wh000001`, ...,
/// `wh00000z`, `wh000010`. The counter wraps once it no longer fits, so
/// callers still rely on the store to detect collisions.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
    modulus: u64,
}

impl SeqGenerator {
    /// Creates a sequential generator with a key prefix.
    ///
    /// The prefix must be shorter than a key and use only key characters.
    pub fn with_prefix(prefix: impl Into<String>) -> Result<Self, CoreError> {
        Self::with_offset(prefix, 0)
    }

    /// Creates a sequential generator starting from `offset`.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Result<Self, CoreError> {
        let prefix = prefix.into();
        if prefix.len() >= KEY_LENGTH {
            return Err(CoreError::InvalidShortKey(format!(
                "prefix must be shorter than {} characters, got '{}'",
                KEY_LENGTH, prefix
            )));
        }
        if !prefix.bytes().all(ShortKey::is_key_byte) {
            return Err(CoreError::InvalidShortKey(format!(
                "prefix must contain only lowercase letters and digits: '{}'",
                prefix
            )));
        }

        let width = (KEY_LENGTH - prefix.len()) as u32;
        let modulus = (ALPHABET.len() as u64).saturating_pow(width);

        Ok(Self {
            counter: AtomicU64::new(offset),
            prefix,
            modulus,
        })
    }

    fn encode(&self, mut value: u64) -> String {
        let width = KEY_LENGTH - self.prefix.len();
        let base = ALPHABET.len() as u64;
        // digits first, letters after, so keys sort like numbers
        const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

        let mut buf = vec![b'0'; width];
        for slot in buf.iter_mut().rev() {
            *slot = DIGITS[(value % base) as usize];
            value /= base;
        }

        let mut key = String::with_capacity(KEY_LENGTH);
        key.push_str(&self.prefix);
        key.extend(buf.into_iter().map(char::from));
        key
    }
}

impl Generator for SeqGenerator {
    type Output = ShortKey;

    fn generate(&self) -> Self::Output {
        let count = self.counter.fetch_add(1, Ordering::SeqCst) % self.modulus;
        ShortKey::new_unchecked(self.encode(count))
    }
}
