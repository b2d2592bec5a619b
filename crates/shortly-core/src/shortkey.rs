use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Number of characters in every short key.
pub const KEY_LENGTH: usize = 8;

/// Characters a short key is drawn from.
pub const ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A fixed-length token identifying a shortened URL.
///
/// Keys are exactly [`KEY_LENGTH`] characters from `[a-z0-9]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortKey(String);

impl ShortKey {
    /// Creates a new `ShortKey` after validating the input.
    pub fn new(key: impl Into<String>) -> Result<Self, CoreError> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    /// Creates a `ShortKey` without validation.
    ///
    /// Use this only for keys produced by trusted internal sources
    /// (generators, rows read back from storage).
    pub fn new_unchecked(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Renders the public short URL under `base_url`.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `byte` may appear in a key.
    pub fn is_key_byte(byte: u8) -> bool {
        byte.is_ascii_lowercase() || byte.is_ascii_digit()
    }

    fn validate(key: &str) -> Result<(), CoreError> {
        if key.len() != KEY_LENGTH {
            return Err(CoreError::InvalidShortKey(format!(
                "length must be {}, got {}",
                KEY_LENGTH,
                key.len()
            )));
        }

        if !key.bytes().all(Self::is_key_byte) {
            return Err(CoreError::InvalidShortKey(format!(
                "must contain only lowercase letters and digits: '{}'",
                key
            )));
        }

        Ok(())
    }
}

impl Display for ShortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ShortKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
