//! What a domain type has to provide to be cached: a name, a way to read the
//! lookup field back off a decoded object, and a fetcher for the primary store.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Number, Value};
use std::future::Future;
use std::sync::Arc;

pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the type or collection, part of the derived keys.
    fn type_name() -> &'static str;

    /// Value of `field` on this object, rendered the way lookups pass it in.
    ///
    /// The default goes through the object's JSON form: strings are returned
    /// as-is, numbers and booleans as their JSON text, anything else is `None`.
    /// Override it when serializing the whole object is too costly.
    fn field_value(&self, field: &str) -> Option<String> {
        match serde_json::to_value(self).ok()?.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Whether this object is the one a `field = value` lookup asked for.
    ///
    /// Exact text match, or numeric equality when both sides are JSON
    /// numbers and at least one is fractional, so a float field rendered
    /// `5.0` still matches a lookup by `5`. Integers compare exactly.
    fn matches_lookup(&self, field: &str, value: &str) -> bool {
        self.field_value(field)
            .is_some_and(|found| found == value || same_number(&found, value))
    }
}

fn same_number(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (a.parse::<Number>(), b.parse::<Number>()) else {
        return false;
    };
    if a.is_f64() || b.is_f64() {
        matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
    } else {
        a == b
    }
}

/// Lookup against the primary store. `Ok(None)` means no object matches.
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    async fn fetch(&self, field: &str, value: &str) -> anyhow::Result<Option<T>>;
}

#[async_trait]
impl<T, F> Fetcher<T> for Arc<F>
where
    T: Send + 'static,
    F: Fetcher<T> + ?Sized,
{
    async fn fetch(&self, field: &str, value: &str) -> anyhow::Result<Option<T>> {
        (**self).fetch(field, value).await
    }
}

/// Adapts an async closure into a [`Fetcher`].
///
/// ```rust,ignore
/// let fetcher = FnFetcher::new(|field, value| async move {
///     db.find_post(&field, &value).await
/// });
/// ```
pub struct FnFetcher<F>(F);

impl<F> FnFetcher<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<T, F, Fut> Fetcher<T> for FnFetcher<F>
where
    T: Send + 'static,
    F: Fn(String, String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<T>>> + Send,
{
    async fn fetch(&self, field: &str, value: &str) -> anyhow::Result<Option<T>> {
        (self.0)(field.to_string(), value.to_string()).await
    }
}
