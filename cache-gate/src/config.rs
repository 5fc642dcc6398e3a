use common_redis::RedisClient;
use envconfig::Envconfig;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;

use crate::codec::CompressionConfig;
use crate::errors::CacheError;
use crate::types::CacheConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlexBool(pub bool);

impl FromStr for FlexBool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FlexBool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FlexBool(false)),
            _ => Err(format!("Invalid boolean value: {}", s)),
        }
    }
}

impl From<FlexBool> for bool {
    fn from(flex: FlexBool) -> Self {
        flex.0
    }
}

impl Deref for FlexBool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    // 0 disables the timeout
    #[envconfig(from = "REDIS_RESPONSE_TIMEOUT_MS", default = "100")]
    pub redis_response_timeout_ms: u64,

    #[envconfig(from = "REDIS_CONNECTION_TIMEOUT_MS", default = "5000")]
    pub redis_connection_timeout_ms: u64,

    #[envconfig(from = "CACHE_KEY_PREFIX", default = "cache:")]
    pub cache_key_prefix: String,

    #[envconfig(from = "CACHE_FLAG_KEY_PREFIX", default = "flag:")]
    pub cache_flag_key_prefix: String,

    #[envconfig(from = "CACHE_FLAG_TTL_SECONDS", default = "1")]
    pub cache_flag_ttl_seconds: u64,

    #[envconfig(from = "CACHE_DEGRADE_ON_STORE_FAILURE", default = "true")]
    pub cache_degrade_on_store_failure: FlexBool,

    #[envconfig(from = "CACHE_COMPRESSION_ENABLED", default = "false")]
    pub cache_compression_enabled: FlexBool,

    #[envconfig(from = "CACHE_COMPRESSION_THRESHOLD", default = "512")]
    pub cache_compression_threshold: usize,

    #[envconfig(from = "CACHE_COMPRESSION_LEVEL", default = "0")]
    pub cache_compression_level: i32,
}

impl Config {
    pub fn default_test_config() -> Self {
        Self {
            redis_url: "redis://localhost:6379/".to_string(),
            redis_response_timeout_ms: 100,
            redis_connection_timeout_ms: 5000,
            cache_key_prefix: "test_cache:".to_string(),
            cache_flag_key_prefix: "test_flag:".to_string(),
            cache_flag_ttl_seconds: 1,
            cache_degrade_on_store_failure: FlexBool(true),
            cache_compression_enabled: FlexBool(false),
            cache_compression_threshold: 512,
            cache_compression_level: 0,
        }
    }

    pub fn cache_config(&self) -> Result<CacheConfig, CacheError> {
        let config = CacheConfig {
            cache_prefix: self.cache_key_prefix.clone(),
            flag_prefix: self.cache_flag_key_prefix.clone(),
            flag_ttl_seconds: self.cache_flag_ttl_seconds,
            degrade_on_store_failure: *self.cache_degrade_on_store_failure,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn compression_config(&self) -> CompressionConfig {
        if !*self.cache_compression_enabled {
            return CompressionConfig::disabled();
        }
        CompressionConfig::new(
            true,
            self.cache_compression_threshold,
            self.cache_compression_level,
        )
    }

    pub fn redis_response_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.redis_response_timeout_ms)
    }

    pub fn redis_connection_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.redis_connection_timeout_ms)
    }

    pub async fn create_redis_client(&self) -> Result<RedisClient, CacheError> {
        let client = RedisClient::with_config(
            self.redis_url.clone(),
            self.redis_response_timeout(),
            self.redis_connection_timeout(),
        )
        .await?;
        Ok(client)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
