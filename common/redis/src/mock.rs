use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::{Claim, Client, CustomRedisError};

const CLAIM_MARKER: &[u8] = b"1";

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

/// In-memory stand-in for [`crate::RedisClient`].
///
/// Every operation runs under a single lock, so the scripted operations are as
/// atomic as their Lua counterparts. Expiry follows `tokio::time`, which lets
/// tests drive TTLs with a paused clock. Clones share state.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    store: Arc<Mutex<HashMap<String, StoredValue>>>,
    errors: Arc<Mutex<HashMap<(String, String), CustomRedisError>>>,
    calls: Arc<Mutex<Vec<MockRedisCall>>>,
}

#[derive(Debug, Clone)]
pub enum MockRedisValue {
    None,
    Bytes(Vec<u8>),
    BytesWithTTL(Vec<u8>, u64),
    ClaimTtl(u64),
    Keys(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct MockRedisCall {
    pub op: String,
    pub key: String,
    pub value: MockRedisValue,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockRedisClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail with `err` for `key` until [`MockRedisClient::clear_errors`] is called.
    ///
    /// `op` is the trait method name, e.g. `"get_or_claim"`. For `batch_del`
    /// the key is matched against any of the deleted keys.
    pub fn error_ret(&mut self, op: &str, key: &str, err: CustomRedisError) -> Self {
        lock(&self.errors).insert((op.to_owned(), key.to_owned()), err);
        self.clone()
    }

    pub fn clear_errors(&self) {
        lock(&self.errors).clear();
    }

    /// Seed a value directly, bypassing the call log.
    pub fn insert(&mut self, key: &str, bytes: Vec<u8>, ttl: Option<Duration>) -> Self {
        lock(&self.store).insert(
            key.to_owned(),
            StoredValue {
                bytes,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        self.clone()
    }

    /// Current live value of a key, bypassing the call log.
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        lock(&self.store)
            .get(key)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.bytes.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.peek(key).is_some()
    }

    pub fn get_calls(&self) -> Vec<MockRedisCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_for(&self, op: &str) -> Vec<MockRedisCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.op == op)
            .cloned()
            .collect()
    }

    fn record(&self, op: &str, key: &str, value: MockRedisValue) {
        lock(&self.calls).push(MockRedisCall {
            op: op.to_string(),
            key: key.to_string(),
            value,
        });
    }

    fn injected_error(&self, op: &str, key: &str) -> Option<CustomRedisError> {
        lock(&self.errors)
            .get(&(op.to_owned(), key.to_owned()))
            .cloned()
    }

    fn live_value(
        store: &mut HashMap<String, StoredValue>,
        key: &str,
        now: Instant,
    ) -> Option<Vec<u8>> {
        match store.get(key) {
            Some(stored) if stored.is_live(now) => Some(stored.bytes.clone()),
            Some(_) => {
                store.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn get_raw_bytes(&self, key: String) -> Result<Vec<u8>, CustomRedisError> {
        self.record("get_raw_bytes", &key, MockRedisValue::None);
        if let Some(err) = self.injected_error("get_raw_bytes", &key) {
            return Err(err);
        }

        let mut store = lock(&self.store);
        Self::live_value(&mut store, &key, Instant::now()).ok_or(CustomRedisError::NotFound)
    }

    async fn set_bytes(
        &self,
        key: String,
        value: Vec<u8>,
        ttl_seconds: Option<u64>,
    ) -> Result<(), CustomRedisError> {
        self.record(
            "set_bytes",
            &key,
            match ttl_seconds {
                Some(ttl) => MockRedisValue::BytesWithTTL(value.clone(), ttl),
                None => MockRedisValue::Bytes(value.clone()),
            },
        );
        if let Some(err) = self.injected_error("set_bytes", &key) {
            return Err(err);
        }

        lock(&self.store).insert(
            key,
            StoredValue {
                bytes: value,
                expires_at: ttl_seconds.map(|ttl| Instant::now() + Duration::from_secs(ttl)),
            },
        );
        Ok(())
    }

    async fn del(&self, key: String) -> Result<(), CustomRedisError> {
        self.record("del", &key, MockRedisValue::None);
        if let Some(err) = self.injected_error("del", &key) {
            return Err(err);
        }

        lock(&self.store).remove(&key);
        Ok(())
    }

    async fn batch_del(&self, keys: Vec<String>) -> Result<(), CustomRedisError> {
        self.record(
            "batch_del",
            &format!("keys={}", keys.len()),
            MockRedisValue::Keys(keys.clone()),
        );
        if let Some(err) = keys
            .iter()
            .find_map(|key| self.injected_error("batch_del", key))
        {
            return Err(err);
        }

        let mut store = lock(&self.store);
        for key in &keys {
            store.remove(key);
        }
        Ok(())
    }

    async fn get_or_claim(
        &self,
        value_key: String,
        claim_key: String,
        claim_ttl_seconds: u64,
    ) -> Result<Claim, CustomRedisError> {
        self.record(
            "get_or_claim",
            &value_key,
            MockRedisValue::ClaimTtl(claim_ttl_seconds),
        );
        if let Some(err) = self.injected_error("get_or_claim", &value_key) {
            return Err(err);
        }
        if claim_ttl_seconds == 0 {
            return Err(CustomRedisError::InvalidConfiguration(
                "claim ttl must be at least one second".to_string(),
            ));
        }

        let now = Instant::now();
        let mut store = lock(&self.store);

        if let Some(bytes) = Self::live_value(&mut store, &value_key, now) {
            return Ok(Claim::Value(bytes));
        }
        if Self::live_value(&mut store, &claim_key, now).is_some() {
            return Ok(Claim::Held);
        }

        store.insert(
            claim_key,
            StoredValue {
                bytes: CLAIM_MARKER.to_vec(),
                expires_at: Some(now + Duration::from_secs(claim_ttl_seconds)),
            },
        );
        Ok(Claim::Acquired)
    }

    async fn set_if_claimed(
        &self,
        value_key: String,
        claim_key: String,
        value: Vec<u8>,
    ) -> Result<bool, CustomRedisError> {
        self.record(
            "set_if_claimed",
            &value_key,
            MockRedisValue::Bytes(value.clone()),
        );
        if let Some(err) = self.injected_error("set_if_claimed", &value_key) {
            return Err(err);
        }

        let now = Instant::now();
        let mut store = lock(&self.store);

        if Self::live_value(&mut store, &claim_key, now).is_none() {
            return Ok(false);
        }

        store.insert(
            value_key,
            StoredValue {
                bytes: value,
                expires_at: None,
            },
        );
        store.remove(&claim_key);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_claim_is_acquired_then_held() {
        let client = MockRedisClient::new();

        let first = client
            .get_or_claim("value".to_string(), "claim".to_string(), 1)
            .await
            .unwrap();
        let second = client
            .get_or_claim("value".to_string(), "claim".to_string(), 1)
            .await
            .unwrap();

        assert_eq!(first, Claim::Acquired);
        assert_eq!(second, Claim::Held);
        assert!(client.contains_key("claim"));
    }

    #[tokio::test]
    async fn test_cached_value_does_not_touch_claim() {
        let client = MockRedisClient::new().insert("value", b"cached".to_vec(), None);

        let claim = client
            .get_or_claim("value".to_string(), "claim".to_string(), 1)
            .await
            .unwrap();

        assert_eq!(claim, Claim::Value(b"cached".to_vec()));
        assert!(!client.contains_key("claim"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_expires_after_ttl() {
        let client = MockRedisClient::new();

        client
            .get_or_claim("value".to_string(), "claim".to_string(), 1)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(1001)).await;

        let claim = client
            .get_or_claim("value".to_string(), "claim".to_string(), 1)
            .await
            .unwrap();
        assert_eq!(claim, Claim::Acquired);
    }

    #[tokio::test]
    async fn test_set_if_claimed_writes_and_releases() {
        let client = MockRedisClient::new();
        client
            .get_or_claim("value".to_string(), "claim".to_string(), 1)
            .await
            .unwrap();

        let written = client
            .set_if_claimed("value".to_string(), "claim".to_string(), b"v".to_vec())
            .await
            .unwrap();

        assert!(written);
        assert_eq!(client.peek("value"), Some(b"v".to_vec()));
        assert!(!client.contains_key("claim"));
    }

    #[tokio::test]
    async fn test_set_if_claimed_without_claim_is_noop() {
        let client = MockRedisClient::new();

        let written = client
            .set_if_claimed("value".to_string(), "claim".to_string(), b"v".to_vec())
            .await
            .unwrap();

        assert!(!written);
        assert!(!client.contains_key("value"));
    }

    #[tokio::test]
    async fn test_injected_error_is_returned_and_recorded() {
        let client =
            MockRedisClient::new().error_ret("get_or_claim", "value", CustomRedisError::Timeout);

        let result = client
            .get_or_claim("value".to_string(), "claim".to_string(), 1)
            .await;

        assert!(matches!(result, Err(CustomRedisError::Timeout)));
        assert_eq!(client.calls_for("get_or_claim").len(), 1);
        assert!(!client.contains_key("claim"));

        client.clear_errors();
        let result = client
            .get_or_claim("value".to_string(), "claim".to_string(), 1)
            .await;
        assert_eq!(result.unwrap(), Claim::Acquired);
    }

    #[tokio::test]
    async fn test_batch_del_removes_all_keys() {
        let client = MockRedisClient::new()
            .insert("a", b"1".to_vec(), None)
            .insert("b", b"2".to_vec(), None);

        client
            .batch_del(vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert!(!client.contains_key("a"));
        assert!(!client.contains_key("b"));
    }
}
