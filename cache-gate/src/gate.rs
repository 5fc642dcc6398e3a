//! Miss detection, writer election and conditional write-back.
//!
//! Both operations are single atomic steps against the store, so election is
//! linearizable with every other acquire, commit and invalidation on the same
//! key pair. The flag is a lease: presence means a writer was elected, and its
//! TTL bounds how long a stalled writer can keep others from populating.

use common_redis::{Claim, Client as RedisClient, CustomRedisError};
use std::sync::Arc;
use tracing::debug;

use crate::keys::CacheKeys;

/// Outcome of [`AtomicCacheGate::acquire`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Cached bytes, unverified. The flag was not consulted.
    Hit(Vec<u8>),
    /// Cache and flag were both empty; this caller set the flag and must populate.
    Elected,
    /// Cache empty, another writer holds the flag. Must not commit.
    FlagHeld,
}

impl Acquisition {
    pub fn had_prior_flag(&self) -> bool {
        matches!(self, Acquisition::FlagHeld)
    }

    pub fn cached_bytes(&self) -> Option<&[u8]> {
        match self {
            Acquisition::Hit(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_elected(&self) -> bool {
        matches!(self, Acquisition::Elected)
    }
}

impl From<Claim> for Acquisition {
    fn from(claim: Claim) -> Self {
        match claim {
            Claim::Value(bytes) => Acquisition::Hit(bytes),
            Claim::Acquired => Acquisition::Elected,
            Claim::Held => Acquisition::FlagHeld,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The flag expired or was invalidated after election
    Skipped,
}

#[derive(Clone)]
pub struct AtomicCacheGate {
    client: Arc<dyn RedisClient + Send + Sync>,
    flag_ttl_seconds: u64,
}

impl AtomicCacheGate {
    pub fn new(client: Arc<dyn RedisClient + Send + Sync>, flag_ttl_seconds: u64) -> Self {
        Self {
            client,
            flag_ttl_seconds,
        }
    }

    pub async fn acquire(&self, keys: &CacheKeys) -> Result<Acquisition, CustomRedisError> {
        let claim = self
            .client
            .get_or_claim(
                keys.cache_key.clone(),
                keys.flag_key.clone(),
                self.flag_ttl_seconds,
            )
            .await?;

        let acquisition = Acquisition::from(claim);
        match &acquisition {
            Acquisition::Hit(bytes) => {
                debug!(cache_key = %keys.cache_key, bytes = bytes.len(), "cache hit")
            }
            Acquisition::Elected => debug!(cache_key = %keys.cache_key, "elected as writer"),
            Acquisition::FlagHeld => {
                debug!(cache_key = %keys.cache_key, "cache miss, writer already elected")
            }
        }
        Ok(acquisition)
    }

    /// Write `bytes` and clear the flag, only if the flag is still present.
    ///
    /// Callers must only commit after an [`Acquisition::Elected`]; the gate
    /// itself cannot tell elected and non-elected callers apart.
    pub async fn commit(
        &self,
        keys: &CacheKeys,
        bytes: Vec<u8>,
    ) -> Result<CommitOutcome, CustomRedisError> {
        let written = self
            .client
            .set_if_claimed(keys.cache_key.clone(), keys.flag_key.clone(), bytes)
            .await?;

        if written {
            debug!(cache_key = %keys.cache_key, "committed cache entry");
            Ok(CommitOutcome::Committed)
        } else {
            debug!(cache_key = %keys.cache_key, "flag gone before commit, skipped write");
            Ok(CommitOutcome::Skipped)
        }
    }
}
