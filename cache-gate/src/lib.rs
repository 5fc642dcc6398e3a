//! Stampede-safe read-through object cache backed by redis
//!
//! Objects are looked up by `(type, field, value)` and cached under a hashed
//! key. Each entry has a companion flag key; on a miss exactly one caller wins
//! the flag and is allowed to write the entry back, and only while the flag
//! still exists. Invalidation removes both keys, which makes any in-flight
//! write a no-op.
//!
//! - Atomic check-and-claim and check-and-set through redis scripts
//! - Cached payloads are verified against the lookup before being returned
//! - Optional fallback to the primary source when redis is unavailable
//! - JSON payloads, optionally zstd-compressed
//!
//! # Example
//!
//! ```rust,ignore
//! use cache_gate::{CacheConfig, CacheSource, Cacheable, FnFetcher, ReadThroughCache};
//!
//! impl Cacheable for BlogPost {
//!     fn type_name() -> &'static str {
//!         "BlogPost"
//!     }
//! }
//!
//! let cache = ReadThroughCache::new(
//!     redis,
//!     FnFetcher::new(|field, value| async move { db.find_post(&field, &value).await }),
//!     CacheConfig::default(),
//! )?;
//!
//! let result = cache.get_with_source("title", "First Title").await?;
//! match result.source {
//!     CacheSource::PositiveCache => println!("Cache hit!"),
//!     _ => println!("Loaded from source: {}", result.source),
//! }
//!
//! // After the post is edited
//! cache.invalidate("title", "First Title").await?;
//! ```

pub mod codec;
pub mod config;
pub mod errors;
pub mod gate;
pub mod invalidator;
pub mod keys;
pub mod metrics;
pub mod read_through;
pub mod source;
pub mod types;

pub use codec::{Codec, CompressedJsonCodec, CompressionConfig, JsonCodec};
pub use config::Config;
pub use errors::CacheError;
pub use gate::{Acquisition, AtomicCacheGate, CommitOutcome};
pub use invalidator::Invalidator;
pub use keys::{CacheKeys, HashedKeyDerivation, KeyDerivation};
pub use metrics::ReadThroughCacheWithMetrics;
pub use read_through::ReadThroughCache;
pub use source::{Cacheable, Fetcher, FnFetcher};
pub use types::{CacheConfig, CacheResult, CacheSource, WriteBack};
