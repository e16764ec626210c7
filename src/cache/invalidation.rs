//! Maps configuration changes to the cache entries they make stale.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{CacheKey, CapabilityCache};

/// A committed configuration write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    /// A provider was created, updated, deactivated or deleted.
    Provider { slug: String },
    /// Any capability model was created, updated or (de)activated.
    Models,
    /// One operator's override setting changed.
    OverrideSetting { operator_id: Uuid },
}

impl ConfigChange {
    pub fn affected_keys(&self) -> Vec<CacheKey> {
        match self {
            ConfigChange::Provider { slug } => {
                vec![CacheKey::Provider(slug.clone()), CacheKey::Providers]
            }
            ConfigChange::Models => vec![CacheKey::Models],
            ConfigChange::OverrideSetting { operator_id } => {
                vec![CacheKey::OperatorOverrides(*operator_id)]
            }
        }
    }
}

/// Evicts exactly the entries a change affects. Writers publish after their
/// transaction commits and before returning to the caller.
#[derive(Clone)]
pub struct InvalidationBus {
    cache: Arc<CapabilityCache>,
}

impl InvalidationBus {
    pub fn new(cache: Arc<CapabilityCache>) -> Self {
        Self { cache }
    }

    pub async fn publish(&self, change: ConfigChange) {
        self.publish_all(std::slice::from_ref(&change)).await;
    }

    pub async fn publish_all(&self, changes: &[ConfigChange]) {
        let mut keys: Vec<CacheKey> = Vec::new();
        for change in changes {
            for key in change.affected_keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        if keys.is_empty() {
            return;
        }
        debug!(?changes, evicted = keys.len(), "Publishing configuration change");
        self.cache.invalidate(&keys).await;
    }
}
