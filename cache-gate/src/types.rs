//! Cache configuration types and cache operation results
//!
//! - [`CacheConfig`]: key prefixes, flag TTL and failure policy
//! - [`CacheSource`]: where a value came from (for observability)
//! - [`WriteBack`]: what happened to the cache entry during a read
//! - [`CacheResult`]: a value together with its source and write-back outcome

use std::fmt;

use crate::errors::CacheError;

pub const DEFAULT_CACHE_PREFIX: &str = "cache:";
pub const DEFAULT_FLAG_PREFIX: &str = "flag:";
pub const DEFAULT_FLAG_TTL_SECONDS: u64 = 1;

/// Configuration for cache instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Prefix of the key holding the serialized object
    pub cache_prefix: String,

    /// Prefix of the companion flag key that guards population
    pub flag_prefix: String,

    /// Lifetime of an election. A writer that takes longer than this to fetch
    /// and commit loses its right to write.
    pub flag_ttl_seconds: u64,

    /// When the store fails, serve straight from the primary source instead of
    /// returning [`CacheError::StoreUnavailable`]
    pub degrade_on_store_failure: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            flag_prefix: DEFAULT_FLAG_PREFIX.to_string(),
            flag_ttl_seconds: DEFAULT_FLAG_TTL_SECONDS,
            degrade_on_store_failure: true,
        }
    }
}

impl CacheConfig {
    pub fn new(
        cache_prefix: impl Into<String>,
        flag_prefix: impl Into<String>,
        flag_ttl_seconds: u64,
    ) -> Self {
        Self {
            cache_prefix: cache_prefix.into(),
            flag_prefix: flag_prefix.into(),
            flag_ttl_seconds,
            ..Self::default()
        }
    }

    pub fn with_flag_ttl(mut self, flag_ttl_seconds: u64) -> Self {
        self.flag_ttl_seconds = flag_ttl_seconds;
        self
    }

    /// Surface store failures to callers instead of falling back to the source
    pub fn fail_closed(mut self) -> Self {
        self.degrade_on_store_failure = false;
        self
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.flag_ttl_seconds == 0 {
            return Err(CacheError::InvalidConfiguration(
                "flag ttl must be at least one second".to_string(),
            ));
        }
        if self.cache_prefix == self.flag_prefix {
            return Err(CacheError::InvalidConfiguration(format!(
                "cache and flag prefixes must differ, both are {:?}",
                self.cache_prefix
            )));
        }
        Ok(())
    }
}

/// Indicates where a value came from
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Verified cache hit
    PositiveCache,
    /// Nothing cached, loaded from the primary source
    LoaderCacheMiss,
    /// Cached payload was undecodable or belonged to another lookup; it was
    /// invalidated and the value loaded from the primary source
    LoaderCacheCorrupted,
    /// The store failed, value loaded from the primary source without caching
    LoaderRedisUnavailable,
}

impl fmt::Display for CacheSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Used directly as log field and metric label
        match self {
            CacheSource::PositiveCache => write!(f, "positive_cache"),
            CacheSource::LoaderCacheMiss => write!(f, "loader_cache_miss"),
            CacheSource::LoaderCacheCorrupted => write!(f, "loader_cache_corrupted"),
            CacheSource::LoaderRedisUnavailable => write!(f, "loader_redis_unavailable"),
        }
    }
}

/// What a read did to the cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBack {
    /// Elected writer stored the fetched object
    Committed,
    /// Elected writer lost its flag (expired or invalidated) and wrote nothing
    Skipped,
    /// Another caller held the flag, so this one only read from the source
    NotElected,
    /// No write was attempted (cache hit or degraded store)
    NotAttempted,
    /// The commit itself failed against the store
    Failed,
}

impl fmt::Display for WriteBack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteBack::Committed => write!(f, "committed"),
            WriteBack::Skipped => write!(f, "skipped"),
            WriteBack::NotElected => write!(f, "not_elected"),
            WriteBack::NotAttempted => write!(f, "not_attempted"),
            WriteBack::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a cache read with detailed source information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResult<V> {
    pub value: V,
    pub source: CacheSource,
    pub write_back: WriteBack,
}

impl<V> CacheResult<V> {
    pub fn hit(value: V) -> Self {
        Self {
            value,
            source: CacheSource::PositiveCache,
            write_back: WriteBack::NotAttempted,
        }
    }

    pub fn loaded(value: V, source: CacheSource, write_back: WriteBack) -> Self {
        Self {
            value,
            source,
            write_back,
        }
    }

    /// Check if this was a verified cache hit
    pub fn was_cached(&self) -> bool {
        matches!(self.source, CacheSource::PositiveCache)
    }

    /// Check if the primary source was queried
    pub fn invoked_loader(&self) -> bool {
        !self.was_cached()
    }

    /// Check if there was a cache infrastructure or data problem
    pub fn had_cache_problem(&self) -> bool {
        matches!(
            self.source,
            CacheSource::LoaderCacheCorrupted | CacheSource::LoaderRedisUnavailable
        ) || self.write_back == WriteBack::Failed
    }
}
