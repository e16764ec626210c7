//! # Capability Cache
//!
//! Resolved provider lists, model lists and per-operator override settings are
//! cached behind a key/value [`CacheBackend`] with a bounded TTL. The cache is
//! an optimisation only: backend failures degrade to direct store reads, and
//! entries are evicted by the [`InvalidationBus`] after every configuration
//! write commits.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub mod capability;
pub mod invalidation;
pub mod memory;

pub use capability::CapabilityCache;
pub use invalidation::{ConfigChange, InvalidationBus};
pub use memory::MemoryCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cached value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value store holding serialized entries with a time-to-live.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Drops every entry.
    async fn clear(&self) -> Result<(), CacheError>;
}

/// Narrowly scoped cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// All active providers.
    Providers,
    /// One provider by slug, present or absent.
    Provider(String),
    /// All capability models.
    Models,
    /// One operator's override settings.
    OperatorOverrides(Uuid),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Providers => f.write_str("providers:all"),
            CacheKey::Provider(slug) => write!(f, "provider:{slug}"),
            CacheKey::Models => f.write_str("models:all"),
            CacheKey::OperatorOverrides(operator_id) => write!(f, "overrides:operator:{operator_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_per_provider_and_operator() {
        let operator_id = Uuid::nil();
        assert_eq!(CacheKey::Providers.to_string(), "providers:all");
        assert_eq!(
            CacheKey::Provider("openai".into()).to_string(),
            "provider:openai"
        );
        assert_eq!(CacheKey::Models.to_string(), "models:all");
        assert_eq!(
            CacheKey::OperatorOverrides(operator_id).to_string(),
            format!("overrides:operator:{operator_id}")
        );
    }
}
