use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script, Value};
use std::time::Duration;
use tracing::warn;

use crate::{Claim, Client, CustomRedisError};

// KEYS[1] = value key, KEYS[2] = claim key, ARGV[1] = claim ttl in seconds.
// Replies { 0, value } on a hit, { 1 } when the claim is already held and
// { 2 } when this call took the claim.
const GET_OR_CLAIM_SCRIPT: &str = r#"
local cached = redis.call('GET', KEYS[1])
if cached then
    return { 0, cached }
end
if redis.call('EXISTS', KEYS[2]) == 1 then
    return { 1 }
end
redis.call('SET', KEYS[2], '1', 'EX', ARGV[1])
return { 2 }
"#;

// KEYS[1] = value key, KEYS[2] = claim key, ARGV[1] = value.
// A missing claim means it expired or was invalidated, so nothing is written.
const SET_IF_CLAIMED_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[2]) == 1 then
    redis.call('SET', KEYS[1], ARGV[1])
    redis.call('DEL', KEYS[2])
    return 1
end
return 0
"#;

const CLAIM_REPLY_VALUE: i64 = 0;
const CLAIM_REPLY_HELD: i64 = 1;
const CLAIM_REPLY_ACQUIRED: i64 = 2;

pub struct RedisClient {
    connection: MultiplexedConnection,
    get_or_claim_script: Script,
    set_if_claimed_script: Script,
}

impl RedisClient {
    /// Create a new RedisClient without timeouts (blocks indefinitely).
    pub async fn new(addr: String) -> Result<RedisClient, CustomRedisError> {
        Self::with_config(addr, None, None).await
    }

    /// Create a new RedisClient with timeout control
    ///
    /// # Arguments
    /// * `addr` - Redis connection string
    /// * `response_timeout` - Optional timeout for Redis command responses. `None` means no timeout (blocks indefinitely).
    /// * `connection_timeout` - Optional timeout for establishing connections. `None` means no timeout (blocks indefinitely).
    ///
    /// # Errors
    /// Returns `CustomRedisError::InvalidConfiguration` if `Some(Duration::ZERO)` is passed - use `None` for no timeout instead.
    ///
    /// # Examples
    /// ```no_run
    /// use common_redis::RedisClient;
    /// use std::time::Duration;
    ///
    /// # async fn example() {
    /// let client = RedisClient::with_config(
    ///     "redis://localhost:6379".to_string(),
    ///     Some(Duration::from_millis(100)),
    ///     Some(Duration::from_millis(5000)),
    /// ).await.unwrap();
    /// # }
    /// ```
    pub async fn with_config(
        addr: String,
        response_timeout: Option<Duration>,
        connection_timeout: Option<Duration>,
    ) -> Result<RedisClient, CustomRedisError> {
        // Validate that Duration::ZERO is not passed - use None instead
        if let Some(timeout) = response_timeout {
            if timeout.is_zero() {
                return Err(CustomRedisError::InvalidConfiguration(
                    "Redis response timeout cannot be Duration::ZERO - use None for no timeout"
                        .to_string(),
                ));
            }
        }
        if let Some(timeout) = connection_timeout {
            if timeout.is_zero() {
                return Err(CustomRedisError::InvalidConfiguration(
                    "Redis connection timeout cannot be Duration::ZERO - use None for no timeout"
                        .to_string(),
                ));
            }
        }

        let client = redis::Client::open(addr)?;

        let mut config = redis::AsyncConnectionConfig::new();

        if let Some(timeout) = response_timeout {
            config = config.set_response_timeout(timeout);
        }

        if let Some(timeout) = connection_timeout {
            config = config.set_connection_timeout(timeout);
        }

        let connection = client
            .get_multiplexed_async_connection_with_config(&config)
            .await?;

        Ok(RedisClient {
            connection,
            get_or_claim_script: Script::new(GET_OR_CLAIM_SCRIPT),
            set_if_claimed_script: Script::new(SET_IF_CLAIMED_SCRIPT),
        })
    }

    /// Decode the reply of [`GET_OR_CLAIM_SCRIPT`].
    fn parse_claim_reply(reply: Vec<Value>) -> Result<Claim, CustomRedisError> {
        let reply_len = reply.len();
        Self::decode_claim_reply(reply).inspect_err(|e| {
            warn!(error = %e, reply_len, "Unexpected reply from claim script");
        })
    }

    fn decode_claim_reply(reply: Vec<Value>) -> Result<Claim, CustomRedisError> {
        let status = match reply.first() {
            Some(value) => redis::from_redis_value::<i64>(value)?,
            None => {
                return Err(CustomRedisError::ParseError(
                    "empty reply from claim script".to_string(),
                ))
            }
        };

        match (status, reply.get(1)) {
            (CLAIM_REPLY_VALUE, Some(value)) => {
                Ok(Claim::Value(redis::from_redis_value::<Vec<u8>>(value)?))
            }
            (CLAIM_REPLY_HELD, None) => Ok(Claim::Held),
            (CLAIM_REPLY_ACQUIRED, None) => Ok(Claim::Acquired),
            _ => Err(CustomRedisError::ParseError(format!(
                "unexpected reply from claim script: status {status}, {} items",
                reply.len()
            ))),
        }
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn get_raw_bytes(&self, k: String) -> Result<Vec<u8>, CustomRedisError> {
        let mut conn = self.connection.clone();
        let raw_bytes: Option<Vec<u8>> = conn.get(k).await?;

        raw_bytes.ok_or(CustomRedisError::NotFound)
    }

    async fn set_bytes(
        &self,
        k: String,
        v: Vec<u8>,
        ttl_seconds: Option<u64>,
    ) -> Result<(), CustomRedisError> {
        let mut conn = self.connection.clone();
        match ttl_seconds {
            Some(seconds) => conn.set_ex::<_, _, ()>(k, v, seconds).await?,
            None => conn.set::<_, _, ()>(k, v).await?,
        }
        Ok(())
    }

    async fn del(&self, k: String) -> Result<(), CustomRedisError> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(k).await?;
        Ok(())
    }

    async fn batch_del(&self, keys: Vec<String>) -> Result<(), CustomRedisError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(keys).await?;
        Ok(())
    }

    async fn get_or_claim(
        &self,
        value_key: String,
        claim_key: String,
        claim_ttl_seconds: u64,
    ) -> Result<Claim, CustomRedisError> {
        if claim_ttl_seconds == 0 {
            return Err(CustomRedisError::InvalidConfiguration(
                "claim ttl must be at least one second".to_string(),
            ));
        }

        let mut conn = self.connection.clone();
        let reply: Vec<Value> = self
            .get_or_claim_script
            .key(value_key)
            .key(claim_key)
            .arg(claim_ttl_seconds)
            .invoke_async(&mut conn)
            .await?;

        Self::parse_claim_reply(reply)
    }

    async fn set_if_claimed(
        &self,
        value_key: String,
        claim_key: String,
        v: Vec<u8>,
    ) -> Result<bool, CustomRedisError> {
        let mut conn = self.connection.clone();
        let written: i64 = self
            .set_if_claimed_script
            .key(value_key)
            .key(claim_key)
            .arg(v)
            .invoke_async(&mut conn)
            .await?;

        Ok(written == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod redis_client_config {
        use super::*;

        #[tokio::test]
        async fn test_zero_response_timeout_returns_error() {
            let result = RedisClient::with_config(
                "redis://localhost:6379".to_string(),
                Some(Duration::ZERO),
                None,
            )
            .await;

            assert!(matches!(
                result,
                Err(CustomRedisError::InvalidConfiguration(_))
            ));
            if let Err(CustomRedisError::InvalidConfiguration(msg)) = result {
                assert!(msg.contains("response timeout"));
            }
        }

        #[tokio::test]
        async fn test_zero_connection_timeout_returns_error() {
            let result = RedisClient::with_config(
                "redis://localhost:6379".to_string(),
                None,
                Some(Duration::ZERO),
            )
            .await;

            assert!(matches!(
                result,
                Err(CustomRedisError::InvalidConfiguration(_))
            ));
            if let Err(CustomRedisError::InvalidConfiguration(msg)) = result {
                assert!(msg.contains("connection timeout"));
            }
        }
    }

    mod claim_reply {
        use super::*;

        #[test]
        fn test_value_reply() {
            let reply = vec![Value::Int(0), Value::BulkString(b"payload".to_vec())];
            assert_eq!(
                RedisClient::parse_claim_reply(reply).unwrap(),
                Claim::Value(b"payload".to_vec())
            );
        }

        #[test]
        fn test_held_reply() {
            let reply = vec![Value::Int(1)];
            assert_eq!(RedisClient::parse_claim_reply(reply).unwrap(), Claim::Held);
        }

        #[test]
        fn test_acquired_reply() {
            let reply = vec![Value::Int(2)];
            assert_eq!(
                RedisClient::parse_claim_reply(reply).unwrap(),
                Claim::Acquired
            );
        }

        #[test]
        fn test_malformed_replies_are_parse_errors() {
            for reply in [
                vec![],
                vec![Value::Int(0)],
                vec![Value::Int(7)],
                vec![Value::Int(2), Value::BulkString(b"extra".to_vec())],
            ] {
                assert!(matches!(
                    RedisClient::parse_claim_reply(reply),
                    Err(CustomRedisError::ParseError(_))
                ));
            }
        }
    }

    // These talk to a live server and are skipped unless explicitly requested:
    // REDIS_URL=redis://localhost:6379/ cargo test -p common-redis -- --ignored
    mod live {
        use super::*;

        async fn live_client() -> RedisClient {
            let url = std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/".to_string());
            RedisClient::new(url)
                .await
                .expect("Failed to create redis client")
        }

        fn unique(prefix: &str) -> String {
            format!(
                "{prefix}:{}",
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap()
                    .as_nanos()
            )
        }

        #[tokio::test]
        #[ignore = "requires a running redis"]
        async fn test_claim_lifecycle_against_redis() {
            let client = live_client().await;
            let value_key = unique("test:value");
            let claim_key = unique("test:claim");

            let first = client
                .get_or_claim(value_key.clone(), claim_key.clone(), 5)
                .await
                .unwrap();
            assert_eq!(first, Claim::Acquired);

            let second = client
                .get_or_claim(value_key.clone(), claim_key.clone(), 5)
                .await
                .unwrap();
            assert_eq!(second, Claim::Held);

            let written = client
                .set_if_claimed(value_key.clone(), claim_key.clone(), b"v1".to_vec())
                .await
                .unwrap();
            assert!(written);

            let third = client
                .get_or_claim(value_key.clone(), claim_key.clone(), 5)
                .await
                .unwrap();
            assert_eq!(third, Claim::Value(b"v1".to_vec()));

            client
                .batch_del(vec![value_key.clone(), claim_key.clone()])
                .await
                .unwrap();
            assert!(matches!(
                client.get_raw_bytes(value_key).await,
                Err(CustomRedisError::NotFound)
            ));
        }

        #[tokio::test]
        #[ignore = "requires a running redis"]
        async fn test_set_if_claimed_without_claim_is_a_noop() {
            let client = live_client().await;
            let value_key = unique("test:value");
            let claim_key = unique("test:claim");

            let written = client
                .set_if_claimed(value_key.clone(), claim_key, b"stale".to_vec())
                .await
                .unwrap();

            assert!(!written);
            assert!(matches!(
                client.get_raw_bytes(value_key).await,
                Err(CustomRedisError::NotFound)
            ));
        }
    }
}
