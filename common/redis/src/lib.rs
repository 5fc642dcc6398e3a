use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use redis::ErrorKind as RedisErrorKind;

#[derive(Error, Debug, Clone)]
pub enum CustomRedisError {
    #[error("Not found in redis")]
    NotFound,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Redis(#[from] Arc<redis::RedisError>),
}

impl From<redis::RedisError> for CustomRedisError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CustomRedisError::Timeout
        } else {
            CustomRedisError::Redis(Arc::new(err))
        }
    }
}

impl CustomRedisError {
    pub fn from_redis_kind(kind: redis::ErrorKind, description: &'static str) -> Self {
        CustomRedisError::Redis(Arc::new(redis::RedisError::from((kind, description))))
    }

    /// Whether retrying the same command can possibly succeed.
    ///
    /// Timeouts and dropped connections are worth retrying. Bad configuration,
    /// rejected credentials and replies we cannot parse are not.
    pub fn is_unrecoverable_error(&self) -> bool {
        match self {
            CustomRedisError::Timeout => false,
            CustomRedisError::NotFound
            | CustomRedisError::InvalidConfiguration(_)
            | CustomRedisError::ParseError(_) => true,
            CustomRedisError::Redis(err) => {
                matches!(
                    err.kind(),
                    redis::ErrorKind::InvalidClientConfig | redis::ErrorKind::AuthenticationFailed
                ) || err.is_unrecoverable_error()
            }
        }
    }
}

/// Result of [`Client::get_or_claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The value key was present; the claim key was neither read nor touched.
    Value(Vec<u8>),
    /// Value and claim keys were both absent, the caller now holds the claim.
    Acquired,
    /// The value key was absent and somebody else already holds the claim.
    Held,
}

#[async_trait]
pub trait Client {
    async fn get_raw_bytes(&self, k: String) -> Result<Vec<u8>, CustomRedisError>;

    /// Set raw bytes, with an expiry when `ttl_seconds` is given.
    async fn set_bytes(
        &self,
        k: String,
        v: Vec<u8>,
        ttl_seconds: Option<u64>,
    ) -> Result<(), CustomRedisError>;

    async fn del(&self, k: String) -> Result<(), CustomRedisError>;

    /// Delete every key in a single command.
    async fn batch_del(&self, keys: Vec<String>) -> Result<(), CustomRedisError>;

    /// Atomically read `value_key`; when it is absent, claim `claim_key` for
    /// `claim_ttl_seconds` unless it is already claimed.
    ///
    /// Nothing may interleave between the reads and the write.
    async fn get_or_claim(
        &self,
        value_key: String,
        claim_key: String,
        claim_ttl_seconds: u64,
    ) -> Result<Claim, CustomRedisError>;

    /// Atomically write `v` to `value_key` and release `claim_key`, but only if
    /// `claim_key` still exists. Returns whether the write happened.
    async fn set_if_claimed(
        &self,
        value_key: String,
        claim_key: String,
        v: Vec<u8>,
    ) -> Result<bool, CustomRedisError>;
}

mod client;
mod mock;

pub use client::RedisClient;
pub use mock::{MockRedisCall, MockRedisClient, MockRedisValue};
