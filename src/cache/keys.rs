//! Cache key derivation.
//!
//! Keys are either an entity id used verbatim (post content) or a fixed-length
//! fingerprint over a namespace and ordered identity parts (menu fragments,
//! translation catalogs). Fingerprints are 128 bits of SHA-256, hex encoded, so
//! a key never exceeds 32 characters however large the inputs are.

use std::fmt;

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a fingerprint key.
const FINGERPRINT_BYTES: usize = 16;

/// A key inside one cache group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for content that only varies by entity id.
    pub fn from_id(id: impl fmt::Display) -> Self {
        Self(id.to_string())
    }

    /// Wrap an already derived key, e.g. one read back from a key registry.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Deterministic fingerprinting of cache identity.
pub struct KeyBuilder;

impl KeyBuilder {
    /// Hash `namespace` and the ordered identity `parts` into a bounded-length key.
    ///
    /// Every part is length-prefixed before hashing, so moving bytes across a
    /// part boundary (`["ab", "c"]` vs `["a", "bc"]`) changes the key.
    pub fn build<I, P>(namespace: &str, parts: I) -> CacheKey
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut hasher = Sha256::new();
        absorb(&mut hasher, namespace.as_bytes());
        for part in parts {
            absorb(&mut hasher, part.as_ref());
        }
        let digest = hasher.finalize();
        CacheKey(hex::encode(&digest[..FINGERPRINT_BYTES]))
    }
}

fn absorb(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
