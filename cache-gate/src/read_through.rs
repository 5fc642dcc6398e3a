//! Read-through cache over the gate protocol
//!
//! A read goes: acquire → (hit: verify → return) / (miss: fetch → commit if
//! elected). A hit that fails to decode or belongs to a different lookup is
//! invalidated and the whole sequence runs again from a clean slate, so
//! write-back eligibility never rests on flag state seen before the
//! invalidation.

use common_redis::{Client as RedisClient, CustomRedisError};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::codec::{Codec, JsonCodec};
use crate::errors::CacheError;
use crate::gate::{Acquisition, AtomicCacheGate, CommitOutcome};
use crate::invalidator::Invalidator;
use crate::keys::{CacheKeys, HashedKeyDerivation, KeyDerivation};
use crate::source::{Cacheable, Fetcher};
use crate::types::{CacheConfig, CacheResult, CacheSource, WriteBack};

/// Why a cached payload was not trusted. Never leaves this module.
#[derive(Debug)]
enum Rejection {
    Undecodable(CacheError),
    VerificationMismatch { found: Option<String> },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Undecodable(e) => write!(f, "undecodable payload: {e}"),
            Rejection::VerificationMismatch { found: Some(found) } => {
                write!(f, "payload belongs to {found:?}")
            }
            Rejection::VerificationMismatch { found: None } => {
                write!(f, "payload lacks the lookup field")
            }
        }
    }
}

/// Stampede-safe read-through cache for one domain type.
///
/// - Only the caller elected on a miss writes the entry back, and only while
///   its flag survives, so concurrent misses cause at most one write per flag
///   lifetime and an invalidation racing a writer always wins.
/// - Hits are checked against the lookup before being returned.
/// - With [`CacheConfig::degrade_on_store_failure`], store outages turn into
///   direct reads from the primary source.
///
/// # Example
/// ```rust,ignore
/// let cache = ReadThroughCache::new(redis, PostFetcher::new(db), CacheConfig::default())?;
///
/// let post: BlogPost = cache.get("title", "First Title").await?;
/// cache.invalidate("title", "First Title").await?;
/// ```
pub struct ReadThroughCache<T, F, C = JsonCodec> {
    gate: AtomicCacheGate,
    invalidator: Invalidator,
    keys: Arc<dyn KeyDerivation>,
    fetcher: F,
    codec: C,
    config: CacheConfig,
    _object: PhantomData<fn() -> T>,
}

impl<T, F> ReadThroughCache<T, F, JsonCodec>
where
    T: Cacheable,
    F: Fetcher<T>,
{
    pub fn new(
        client: Arc<dyn RedisClient + Send + Sync>,
        fetcher: F,
        config: CacheConfig,
    ) -> Result<Self, CacheError> {
        Self::with_codec(client, fetcher, JsonCodec, config)
    }
}

impl<T, F, C> ReadThroughCache<T, F, C>
where
    T: Cacheable,
    F: Fetcher<T>,
    C: Codec,
{
    pub fn with_codec(
        client: Arc<dyn RedisClient + Send + Sync>,
        fetcher: F,
        codec: C,
        config: CacheConfig,
    ) -> Result<Self, CacheError> {
        let keys = Arc::new(HashedKeyDerivation::from_config(&config));
        Self::with_key_derivation(client, keys, fetcher, codec, config)
    }

    pub fn with_key_derivation(
        client: Arc<dyn RedisClient + Send + Sync>,
        keys: Arc<dyn KeyDerivation>,
        fetcher: F,
        codec: C,
        config: CacheConfig,
    ) -> Result<Self, CacheError> {
        config.validate()?;

        Ok(Self {
            gate: AtomicCacheGate::new(client.clone(), config.flag_ttl_seconds),
            invalidator: Invalidator::new(client, keys.clone()),
            keys,
            fetcher,
            codec,
            config,
            _object: PhantomData,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn invalidator(&self) -> &Invalidator {
        &self.invalidator
    }

    pub fn keys_for(&self, field: &str, value: &str) -> CacheKeys {
        self.keys.derive(T::type_name(), field, value)
    }

    /// Get the object whose `field` equals `value`, from cache or the primary source
    pub async fn get(&self, field: &str, value: &str) -> Result<T, CacheError> {
        Ok(self.get_with_source(field, value).await?.value)
    }

    /// Like [`ReadThroughCache::get`], also reporting where the object came
    /// from and what happened to the cache entry
    #[instrument(skip_all, fields(type_name = T::type_name(), field = %field))]
    pub async fn get_with_source(
        &self,
        field: &str,
        value: &str,
    ) -> Result<CacheResult<T>, CacheError> {
        let keys = self.keys_for(field, value);
        let mut recovering = false;

        loop {
            let acquisition = match self.gate.acquire(&keys).await {
                Ok(acquisition) => acquisition,
                Err(e) => return self.serve_without_store(field, value, e).await,
            };

            let source = if recovering {
                CacheSource::LoaderCacheCorrupted
            } else {
                CacheSource::LoaderCacheMiss
            };

            match acquisition {
                Acquisition::Hit(bytes) => match self.verify(&bytes, field, value) {
                    Ok(object) => return Ok(CacheResult::hit(object)),
                    Err(rejection) => {
                        warn!(
                            cache_key = %keys.cache_key,
                            reason = %rejection,
                            "Discarding cached payload"
                        );

                        if recovering {
                            // Bad data came back after our own invalidation,
                            // serve from source and leave the entry alone.
                            let object = self.fetch(field, value).await?;
                            return Ok(CacheResult::loaded(
                                object,
                                CacheSource::LoaderCacheCorrupted,
                                WriteBack::NotAttempted,
                            ));
                        }

                        if let Err(e) = self.invalidator.invalidate_keys(&keys).await {
                            return self.serve_without_store(field, value, e).await;
                        }
                        recovering = true;
                    }
                },
                Acquisition::FlagHeld => {
                    let object = self.fetch(field, value).await?;
                    return Ok(CacheResult::loaded(object, source, WriteBack::NotElected));
                }
                Acquisition::Elected => {
                    let object = self.fetch(field, value).await?;
                    let write_back = self.write_back(&keys, &object).await?;
                    return Ok(CacheResult::loaded(object, source, write_back));
                }
            }
        }
    }

    /// Drop the cached object for this lookup and its flag
    pub async fn invalidate(&self, field: &str, value: &str) -> Result<(), CacheError> {
        self.invalidator
            .invalidate(T::type_name(), field, value)
            .await?;
        Ok(())
    }

    fn verify(&self, bytes: &[u8], field: &str, value: &str) -> Result<T, Rejection> {
        let object: T = self.codec.decode(bytes).map_err(Rejection::Undecodable)?;

        if object.matches_lookup(field, value) {
            Ok(object)
        } else {
            Err(Rejection::VerificationMismatch {
                found: object.field_value(field),
            })
        }
    }

    async fn fetch(&self, field: &str, value: &str) -> Result<T, CacheError> {
        match self
            .fetcher
            .fetch(field, value)
            .await
            .map_err(CacheError::Source)?
        {
            Some(object) => Ok(object),
            None => {
                debug!("No object in primary source");
                Err(CacheError::NotFound {
                    type_name: T::type_name().to_string(),
                    field: field.to_string(),
                    value: value.to_string(),
                })
            }
        }
    }

    async fn write_back(&self, keys: &CacheKeys, object: &T) -> Result<WriteBack, CacheError> {
        let bytes = self.codec.encode(object).inspect_err(|e| {
            error!(cache_key = %keys.cache_key, error = %e, "Failed to serialize object for cache");
        })?;

        match self.gate.commit(keys, bytes).await {
            Ok(CommitOutcome::Committed) => Ok(WriteBack::Committed),
            Ok(CommitOutcome::Skipped) => Ok(WriteBack::Skipped),
            Err(e) if self.config.degrade_on_store_failure => {
                warn!(
                    cache_key = %keys.cache_key,
                    error = %e,
                    "Failed to write back cache entry"
                );
                Ok(WriteBack::Failed)
            }
            Err(e) => Err(CacheError::StoreUnavailable(e)),
        }
    }

    async fn serve_without_store(
        &self,
        field: &str,
        value: &str,
        err: CustomRedisError,
    ) -> Result<CacheResult<T>, CacheError> {
        if !self.config.degrade_on_store_failure {
            return Err(CacheError::StoreUnavailable(err));
        }

        warn!(
            error = %err,
            unrecoverable = err.is_unrecoverable_error(),
            "Cache store unavailable, reading from primary source"
        );
        let object = self.fetch(field, value).await?;
        Ok(CacheResult::loaded(
            object,
            CacheSource::LoaderRedisUnavailable,
            WriteBack::NotAttempted,
        ))
    }
}
