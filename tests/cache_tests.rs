//! Capability cache behaviour when the backend misbehaves.

use ai_access::cache::{CacheBackend, CacheError, CacheKey, CapabilityCache, MemoryCache};
use ai_access::repositories::{ProviderChanges, ProviderRepository};
use ai_access::store::{ConfigStore, DbConfigStore};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{chat_map, insert_provider, setup_test_db, shared_provider};

/// Memory cache whose operations can be switched to fail.
struct FlakyBackend {
    inner: MemoryCache,
    fail_get: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyBackend {
    fn new() -> Self {
        Self {
            inner: MemoryCache::with_capacity(64),
            fail_get: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    fn unavailable() -> CacheError {
        CacheError::Unavailable("connection refused".into())
    }
}

#[async_trait]
impl CacheBackend for FlakyBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.delete(key).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear().await
    }
}

async fn cache_over(
    backend: Arc<FlakyBackend>,
) -> Result<(CapabilityCache, ProviderRepository)> {
    let db = Arc::new(setup_test_db().await?);
    insert_provider(&db, shared_provider("openai", chat_map())).await?;
    let store: Arc<dyn ConfigStore> = Arc::new(DbConfigStore::new(db.clone()));
    let cache = CapabilityCache::new(backend, store, Duration::from_secs(300));
    Ok((cache, ProviderRepository::new(db)))
}

fn stop_sharing() -> ProviderChanges {
    ProviderChanges {
        allow_shared_for_operators: Some(false),
        ..ProviderChanges::default()
    }
}

#[tokio::test]
async fn reads_fall_back_to_the_store_when_the_backend_is_down() -> Result<()> {
    let backend = Arc::new(FlakyBackend::new());
    backend.fail_get.store(true, Ordering::SeqCst);
    let (cache, _repo) = cache_over(backend.clone()).await?;

    let provider = cache.provider("openai").await?;
    assert!(provider.is_some());
    assert_eq!(cache.active_providers().await?.len(), 1);
    assert!(!cache.is_degraded(), "read failures alone do not degrade");
    Ok(())
}

#[tokio::test]
async fn cached_entries_are_served_until_invalidated() -> Result<()> {
    let backend = Arc::new(FlakyBackend::new());
    let (cache, repo) = cache_over(backend).await?;

    assert!(cache.provider("openai").await?.unwrap().allow_shared_for_operators);
    repo.update_by_slug("openai", stop_sharing()).await?;

    // No invalidation yet, so the entry is still served.
    assert!(cache.provider("openai").await?.unwrap().allow_shared_for_operators);

    cache.invalidate(&[CacheKey::Provider("openai".into())]).await;
    assert!(!cache.provider("openai").await?.unwrap().allow_shared_for_operators);
    Ok(())
}

#[tokio::test]
async fn failed_eviction_bypasses_the_cache_until_flushed() -> Result<()> {
    let backend = Arc::new(FlakyBackend::new());
    let (cache, repo) = cache_over(backend.clone()).await?;

    cache.provider("openai").await?;
    repo.update_by_slug("openai", stop_sharing()).await?;

    backend.fail_delete.store(true, Ordering::SeqCst);
    cache.invalidate(&[CacheKey::Provider("openai".into())]).await;
    assert!(cache.is_degraded());

    // The stale entry is still in the backend but is never served.
    assert!(backend.inner.get("provider:openai").await?.is_some());
    assert!(!cache.provider("openai").await?.unwrap().allow_shared_for_operators);

    backend.fail_delete.store(false, Ordering::SeqCst);
    assert!(cache.flush().await);
    assert!(!cache.is_degraded());
    assert!(backend.inner.is_empty().await);

    assert!(!cache.provider("openai").await?.unwrap().allow_shared_for_operators);
    assert!(backend.inner.get("provider:openai").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn unknown_providers_are_cached_as_absent() -> Result<()> {
    let backend = Arc::new(FlakyBackend::new());
    let (cache, _repo) = cache_over(backend.clone()).await?;

    assert!(cache.provider("mistral").await?.is_none());
    assert!(backend.inner.get("provider:mistral").await?.is_some());
    Ok(())
}
