use common_redis::CustomRedisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No {type_name} found where {field} = {value:?}")]
    NotFound {
        type_name: String,
        field: String,
        value: String,
    },
    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(#[from] CustomRedisError),
    #[error("Failed to serialize object for caching: {0}")]
    Serialization(String),
    #[error("Failed to deserialize cached payload: {0}")]
    Deserialization(String),
    #[error("Invalid cache configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Primary source lookup failed: {0}")]
    Source(#[source] anyhow::Error),
}

impl CacheError {
    /// Short, stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CacheError::NotFound { .. } => "not_found",
            CacheError::StoreUnavailable(_) => "store_unavailable",
            CacheError::Serialization(_) => "serialization",
            CacheError::Deserialization(_) => "deserialization",
            CacheError::InvalidConfiguration(_) => "invalid_configuration",
            CacheError::Source(_) => "source",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_the_lookup() {
        let err = CacheError::NotFound {
            type_name: "BlogPost".to_string(),
            field: "title".to_string(),
            value: "First Title".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No BlogPost found where title = \"First Title\""
        );
        assert_eq!(err.reason(), "not_found");
    }

    #[test]
    fn test_redis_errors_convert_to_store_unavailable() {
        let err: CacheError = CustomRedisError::Timeout.into();
        assert!(matches!(
            err,
            CacheError::StoreUnavailable(CustomRedisError::Timeout)
        ));
        assert_eq!(err.reason(), "store_unavailable");
    }
}
