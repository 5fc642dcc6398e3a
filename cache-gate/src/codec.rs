//! Turning cached objects into bytes and back.
//!
//! [`JsonCodec`] is the default. [`CompressedJsonCodec`] adds zstd compression
//! above a size threshold and reads both compressed and plain payloads, so the
//! compression setting can change without flushing the cache.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::errors::CacheError;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

pub trait Codec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError>;
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

/// Configuration for zstd compression behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionConfig {
    pub enabled: bool,
    /// Payloads strictly larger than this many bytes are compressed
    pub threshold: usize,
    /// Zstd compression level (1-22, or 0 for the library default)
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 512,
            level: 0,
        }
    }
}

impl CompressionConfig {
    pub fn new(enabled: bool, threshold: usize, level: i32) -> Self {
        Self {
            enabled,
            threshold,
            level,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            threshold: 0,
            level: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompressedJsonCodec {
    compression: CompressionConfig,
}

impl CompressedJsonCodec {
    pub fn new(compression: CompressionConfig) -> Self {
        Self { compression }
    }

    /// Decompress if possible, otherwise hand back the input untouched.
    ///
    /// Bytes that start with the zstd magic but fail to decompress are most
    /// likely corrupt, so that case is logged.
    pub(crate) fn try_decompress(data: &[u8]) -> Vec<u8> {
        match zstd::decode_all(data) {
            Ok(decompressed) => decompressed,
            Err(e) => {
                if data.len() >= 4 && data[0..4] == ZSTD_MAGIC {
                    warn!(
                        error = %e,
                        data_len = data.len(),
                        "Failed to decompress data with zstd magic bytes - possible corruption"
                    );
                }
                data.to_vec()
            }
        }
    }

    pub(crate) fn maybe_compress(
        data: Vec<u8>,
        config: &CompressionConfig,
    ) -> Result<Vec<u8>, CacheError> {
        if config.enabled && data.len() > config.threshold {
            zstd::encode_all(&data[..], config.level)
                .map_err(|e| CacheError::Serialization(format!("Compression error: {e}")))
        } else {
            Ok(data)
        }
    }
}

impl Codec for CompressedJsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        let json = JsonCodec.encode(value)?;
        Self::maybe_compress(json, &self.compression)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        JsonCodec.decode(&Self::try_decompress(bytes))
    }
}
