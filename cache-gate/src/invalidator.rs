use common_redis::{Client as RedisClient, CustomRedisError};
use std::sync::Arc;
use tracing::debug;

use crate::keys::{CacheKeys, KeyDerivation};

/// Deletes a cache entry together with its flag.
///
/// Removing the flag is what makes a racing writer's commit a no-op, so both
/// keys always go in the same command, whatever state the flag is in.
#[derive(Clone)]
pub struct Invalidator {
    client: Arc<dyn RedisClient + Send + Sync>,
    keys: Arc<dyn KeyDerivation>,
}

impl Invalidator {
    pub fn new(client: Arc<dyn RedisClient + Send + Sync>, keys: Arc<dyn KeyDerivation>) -> Self {
        Self { client, keys }
    }

    pub async fn invalidate(
        &self,
        type_name: &str,
        field: &str,
        value: &str,
    ) -> Result<(), CustomRedisError> {
        let keys = self.keys.derive(type_name, field, value);
        self.invalidate_keys(&keys).await
    }

    pub async fn invalidate_keys(&self, keys: &CacheKeys) -> Result<(), CustomRedisError> {
        self.client
            .batch_del(vec![keys.cache_key.clone(), keys.flag_key.clone()])
            .await?;
        debug!(cache_key = %keys.cache_key, flag_key = %keys.flag_key, "invalidated");
        Ok(())
    }
}
