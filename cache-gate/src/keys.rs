use sha1::{Digest, Sha1};

use crate::types::CacheConfig;

/// The cache entry key and its companion flag key. Always derived together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKeys {
    pub cache_key: String,
    pub flag_key: String,
}

pub trait KeyDerivation: Send + Sync {
    /// Must be deterministic, and must never return the same string for both keys.
    fn derive(&self, type_name: &str, field: &str, value: &str) -> CacheKeys;
}

/// Hashes `type$field$value` once and prefixes the digest for each key, so
/// the two keys can only ever pair with each other.
#[derive(Debug, Clone)]
pub struct HashedKeyDerivation {
    cache_prefix: String,
    flag_prefix: String,
}

impl HashedKeyDerivation {
    pub fn new(cache_prefix: impl Into<String>, flag_prefix: impl Into<String>) -> Self {
        Self {
            cache_prefix: cache_prefix.into(),
            flag_prefix: flag_prefix.into(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.cache_prefix.clone(), config.flag_prefix.clone())
    }

    fn digest(type_name: &str, field: &str, value: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(type_name.as_bytes());
        hasher.update(b"$");
        hasher.update(field.as_bytes());
        hasher.update(b"$");
        hasher.update(value.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for HashedKeyDerivation {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl KeyDerivation for HashedKeyDerivation {
    fn derive(&self, type_name: &str, field: &str, value: &str) -> CacheKeys {
        let digest = Self::digest(type_name, field, value);
        CacheKeys {
            cache_key: format!("{}{digest}", self.cache_prefix),
            flag_key: format!("{}{digest}", self.flag_prefix),
        }
    }
}
