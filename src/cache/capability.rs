//! Read-through capability cache over the configuration store.

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CacheBackend, CacheKey};
use crate::error::EngineResult;
use crate::models::{admin_override_setting, capability_model, provider};
use crate::store::ConfigStore;

/// Cache-first view of the configuration store.
///
/// Misses are read from the store and written back with the configured TTL.
/// A backend error on read or write is logged and the store result is used
/// as is. A failed eviction marks the cache degraded: until a full flush
/// succeeds every read goes straight to the store, since a stale entry may
/// still be present.
pub struct CapabilityCache {
    backend: Arc<dyn CacheBackend>,
    store: Arc<dyn ConfigStore>,
    ttl: Duration,
    degraded: AtomicBool,
    /// Bumped on every invalidation. A read that started before a bump does
    /// not write its (possibly stale) result back.
    epoch: AtomicU64,
    write_gate: RwLock<()>,
}

impl CapabilityCache {
    pub fn new(backend: Arc<dyn CacheBackend>, store: Arc<dyn ConfigStore>, ttl: Duration) -> Self {
        Self {
            backend,
            store,
            ttl,
            degraded: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            write_gate: RwLock::new(()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub async fn active_providers(&self) -> EngineResult<Vec<provider::Model>> {
        let store = self.store.clone();
        self.read_through(CacheKey::Providers, || async move {
            store.list_active_providers().await
        })
        .await
    }

    pub async fn provider(&self, slug: &str) -> EngineResult<Option<provider::Model>> {
        let store = self.store.clone();
        let owned = slug.to_string();
        self.read_through(CacheKey::Provider(owned.clone()), || async move {
            store.get_provider(&owned).await
        })
        .await
    }

    pub async fn models(&self) -> EngineResult<Vec<capability_model::Model>> {
        let store = self.store.clone();
        self.read_through(CacheKey::Models, || async move { store.list_models().await })
            .await
    }

    pub async fn operator_overrides(
        &self,
        operator_id: Uuid,
    ) -> EngineResult<Vec<admin_override_setting::Model>> {
        let store = self.store.clone();
        self.read_through(CacheKey::OperatorOverrides(operator_id), || async move {
            store.list_override_settings(operator_id).await
        })
        .await
    }

    /// Evicts `keys`. Called only after the write that made them stale has
    /// committed.
    pub async fn invalidate(&self, keys: &[CacheKey]) {
        let _gate = self.write_gate.write().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);

        if self.is_degraded() {
            self.try_recover().await;
            return;
        }

        for key in keys {
            let key = key.to_string();
            match self.backend.delete(&key).await {
                Ok(()) => {
                    counter!("capability_cache_invalidations_total").increment(1);
                    debug!(cache_key = %key, "Evicted capability cache entry");
                }
                Err(err) => {
                    counter!("capability_cache_errors_total", "op" => "delete").increment(1);
                    warn!(
                        cache_key = %key,
                        error = %err,
                        "Cache eviction failed; bypassing cache until flushed"
                    );
                    self.degraded.store(true, Ordering::SeqCst);
                }
            }
        }
    }

    /// Drops every cached entry. Clears the degraded state on success.
    pub async fn flush(&self) -> bool {
        let _gate = self.write_gate.write().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.try_recover().await
    }

    async fn try_recover(&self) -> bool {
        match self.backend.clear().await {
            Ok(()) => {
                if self.degraded.swap(false, Ordering::SeqCst) {
                    info!("Capability cache flushed; leaving degraded mode");
                }
                true
            }
            Err(err) => {
                counter!("capability_cache_errors_total", "op" => "clear").increment(1);
                warn!(error = %err, "Capability cache flush failed");
                self.degraded.store(true, Ordering::SeqCst);
                false
            }
        }
    }

    async fn read_through<T, F, Fut>(&self, key: CacheKey, load: F) -> EngineResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        if self.is_degraded() {
            return load().await;
        }

        let cache_key = key.to_string();
        match self.backend.get(&cache_key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    counter!("capability_cache_hits_total").increment(1);
                    return Ok(value);
                }
                Err(err) => {
                    counter!("capability_cache_errors_total", "op" => "decode").increment(1);
                    warn!(cache_key = %cache_key, error = %err, "Discarding undecodable cache entry");
                }
            },
            Ok(None) => {}
            Err(err) => {
                counter!("capability_cache_errors_total", "op" => "get").increment(1);
                warn!(cache_key = %cache_key, error = %err, "Cache read failed; using store");
            }
        }
        counter!("capability_cache_misses_total").increment(1);

        let started_epoch = self.epoch.load(Ordering::SeqCst);
        let value = load().await?;

        let encoded = match serde_json::to_string(&value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(cache_key = %cache_key, error = %err, "Could not encode cache entry");
                return Ok(value);
            }
        };

        let _gate = self.write_gate.read().await;
        if self.is_degraded() || self.epoch.load(Ordering::SeqCst) != started_epoch {
            debug!(cache_key = %cache_key, "Configuration changed during read; not caching");
            return Ok(value);
        }
        if let Err(err) = self.backend.set(&cache_key, encoded, self.ttl).await {
            counter!("capability_cache_errors_total", "op" => "set").increment(1);
            warn!(cache_key = %cache_key, error = %err, "Cache write failed");
        }

        Ok(value)
    }
}
