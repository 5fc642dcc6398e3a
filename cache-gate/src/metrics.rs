//! Metrics wrapper for ReadThroughCache
//!
//! Keeps the read path free of metric names and labels. Wrap a cache once at
//! startup and hand the wrapper to request handlers instead.
//!
//! # Example
//!
//! ```rust,ignore
//! let cache = Arc::new(ReadThroughCache::new(redis, fetcher, CacheConfig::default())?);
//! let cache = ReadThroughCacheWithMetrics::new(
//!     cache,
//!     "blog",
//!     "post",
//!     &[("cache_type".to_string(), "dedicated".to_string())],
//! );
//!
//! let post = cache.get("title", "First Title").await?;
//! ```

use common_metrics::{inc, timing_guard};
use std::sync::Arc;

use crate::codec::{Codec, JsonCodec};
use crate::errors::CacheError;
use crate::read_through::ReadThroughCache;
use crate::source::{Cacheable, Fetcher};
use crate::types::{CacheResult, WriteBack};

pub const READS_COUNTER: &str = "read_through_cache_reads_total";
pub const HITS_COUNTER: &str = "read_through_cache_hit_total";
pub const LOADER_INVOKED_COUNTER: &str = "read_through_cache_loader_invoked_total";
pub const WRITE_BACK_COUNTER: &str = "read_through_cache_write_back_total";
pub const ERRORS_COUNTER: &str = "read_through_cache_errors_total";
pub const GET_DURATION_HISTOGRAM: &str = "read_through_cache_get_duration_ms";

/// Wrapper around [`ReadThroughCache`] that emits Prometheus metrics
///
/// Every metric carries `namespace` and `cache_name` plus any additional labels.
///
/// - `read_through_cache_reads_total` - Total reads, including failed ones
/// - `read_through_cache_hit_total{cache_hit="true|false"}` - Verified hits vs. loads
/// - `read_through_cache_loader_invoked_total` - Times the primary source was queried
/// - `read_through_cache_write_back_total{outcome="..."}` - What happened to the entry
/// - `read_through_cache_errors_total{reason="..."}` - Cache problems and failed reads
/// - `read_through_cache_get_duration_ms{outcome="..."}` - Read latency
pub struct ReadThroughCacheWithMetrics<T, F, C = JsonCodec> {
    inner: Arc<ReadThroughCache<T, F, C>>,
    namespace: &'static str,
    cache_name: &'static str,
    additional_labels: Vec<(String, String)>,
}

impl<T, F, C> ReadThroughCacheWithMetrics<T, F, C>
where
    T: Cacheable,
    F: Fetcher<T>,
    C: Codec,
{
    pub fn new(
        inner: Arc<ReadThroughCache<T, F, C>>,
        namespace: &'static str,
        cache_name: &'static str,
        additional_labels: &[(String, String)],
    ) -> Self {
        Self {
            inner,
            namespace,
            cache_name,
            additional_labels: additional_labels.to_vec(),
        }
    }

    pub fn inner(&self) -> &Arc<ReadThroughCache<T, F, C>> {
        &self.inner
    }

    pub async fn get(&self, field: &str, value: &str) -> Result<T, CacheError> {
        Ok(self.get_with_source(field, value).await?.value)
    }

    pub async fn get_with_source(
        &self,
        field: &str,
        value: &str,
    ) -> Result<CacheResult<T>, CacheError> {
        let base_labels = self.base_labels();
        let timer = timing_guard(GET_DURATION_HISTOGRAM, &base_labels);

        let result = self.inner.get_with_source(field, value).await;

        match &result {
            Ok(result) => {
                timer.label("outcome", "ok").fin();
                self.emit_metrics(&base_labels, result);
            }
            Err(e) => {
                timer.label("outcome", "error").fin();
                self.emit_error(&base_labels, e);
            }
        }

        result
    }

    pub async fn invalidate(&self, field: &str, value: &str) -> Result<(), CacheError> {
        self.inner.invalidate(field, value).await.inspect_err(|e| {
            let mut labels = self.base_labels();
            labels.push(("reason".to_string(), format!("invalidate_{}", e.reason())));
            inc(ERRORS_COUNTER, &labels, 1);
        })
    }

    fn base_labels(&self) -> Vec<(String, String)> {
        let mut labels = vec![
            ("namespace".to_string(), self.namespace.to_string()),
            ("cache_name".to_string(), self.cache_name.to_string()),
        ];
        labels.extend(self.additional_labels.iter().cloned());
        labels
    }

    fn emit_metrics(&self, base_labels: &[(String, String)], result: &CacheResult<T>) {
        inc(READS_COUNTER, base_labels, 1);

        let mut hit_labels = base_labels.to_vec();
        hit_labels.push(("cache_hit".to_string(), result.was_cached().to_string()));
        inc(HITS_COUNTER, &hit_labels, 1);

        if result.invoked_loader() {
            inc(LOADER_INVOKED_COUNTER, base_labels, 1);
        }

        if result.write_back != WriteBack::NotAttempted {
            let mut write_labels = base_labels.to_vec();
            write_labels.push(("outcome".to_string(), result.write_back.to_string()));
            inc(WRITE_BACK_COUNTER, &write_labels, 1);
        }

        if result.had_cache_problem() {
            let reason = if result.write_back == WriteBack::Failed {
                "write_back_failed".to_string()
            } else {
                result.source.to_string()
            };
            let mut error_labels = base_labels.to_vec();
            error_labels.push(("reason".to_string(), reason));
            inc(ERRORS_COUNTER, &error_labels, 1);
        }
    }

    fn emit_error(&self, base_labels: &[(String, String)], error: &CacheError) {
        inc(READS_COUNTER, base_labels, 1);

        // Missing objects are an answer, not a fault
        if matches!(error, CacheError::NotFound { .. }) {
            inc(LOADER_INVOKED_COUNTER, base_labels, 1);
            return;
        }

        let mut error_labels = base_labels.to_vec();
        error_labels.push(("reason".to_string(), error.reason().to_string()));
        inc(ERRORS_COUNTER, &error_labels, 1);
    }
}
