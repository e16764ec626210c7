//! # Configuration Service
//!
//! Every configuration write goes through here: the write is committed, then
//! the affected cache entries are evicted, and only then does the call
//! return. Credentials arrive in plaintext and are sealed before they reach
//! the store.

use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::activation::{ActivationEnforcer, ScopeViolation};
use crate::cache::{CapabilityCache, ConfigChange, InvalidationBus};
use crate::crypto::{Credential, CredentialScope, CryptoKey, seal_credential};
use crate::error::{EngineError, EngineResult};
use crate::models::capability::CapabilityMap;
use crate::models::{admin_override_setting, capability_model, provider};
use crate::repositories::{NewProvider, ProviderChanges, ProviderRepository};
use crate::store::ConfigStore;

/// A provider to create.
#[derive(Debug, Clone)]
pub struct ProviderDraft {
    pub slug: String,
    pub display_name: String,
    pub is_active: bool,
    pub capabilities: CapabilityMap,
    pub shared_credential: Option<Credential>,
    pub allow_shared_for_operators: bool,
    pub api_base_url: Option<String>,
}

/// Partial provider update. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct ProviderUpdate {
    /// Must equal the current slug when given; slugs never change.
    pub slug: Option<String>,
    pub display_name: Option<String>,
    pub is_active: Option<bool>,
    pub capabilities: Option<CapabilityMap>,
    /// `Some(None)` removes the shared credential.
    pub shared_credential: Option<Option<Credential>>,
    pub allow_shared_for_operators: Option<bool>,
    pub api_base_url: Option<Option<String>>,
}

pub struct ConfigService {
    providers: ProviderRepository,
    store: Arc<dyn ConfigStore>,
    activation: Arc<ActivationEnforcer>,
    cache: Arc<CapabilityCache>,
    bus: InvalidationBus,
    key: CryptoKey,
}

impl ConfigService {
    pub fn new(
        providers: ProviderRepository,
        store: Arc<dyn ConfigStore>,
        activation: Arc<ActivationEnforcer>,
        cache: Arc<CapabilityCache>,
        key: CryptoKey,
    ) -> Self {
        let bus = InvalidationBus::new(cache.clone());
        Self {
            providers,
            store,
            activation,
            cache,
            bus,
            key,
        }
    }

    #[instrument(skip(self, draft), fields(provider_slug = %draft.slug))]
    pub async fn create_provider(
        &self,
        draft: ProviderDraft,
        created_by: Option<Uuid>,
    ) -> EngineResult<provider::Model> {
        let shared_credential_ciphertext = draft
            .shared_credential
            .as_ref()
            .map(|credential| self.seal_shared(&draft.slug, credential))
            .transpose()?;

        let created = self
            .providers
            .create(NewProvider {
                slug: draft.slug,
                display_name: draft.display_name,
                is_active: draft.is_active,
                capabilities: draft.capabilities,
                shared_credential_ciphertext,
                allow_shared_for_operators: draft.allow_shared_for_operators,
                api_base_url: draft.api_base_url,
                created_by,
            })
            .await?;

        self.bus
            .publish(ConfigChange::Provider {
                slug: created.slug.clone(),
            })
            .await;
        info!(is_active = created.is_active, "Created provider");
        Ok(created)
    }

    #[instrument(skip(self, update))]
    pub async fn update_provider(
        &self,
        slug: &str,
        update: ProviderUpdate,
    ) -> EngineResult<provider::Model> {
        if let Some(requested) = update.slug.as_deref()
            && requested != slug
        {
            return Err(EngineError::SlugImmutable {
                from: slug.to_string(),
                to: requested.to_string(),
            });
        }

        let shared_credential_ciphertext = match update.shared_credential {
            Some(Some(credential)) => Some(Some(self.seal_shared(slug, &credential)?)),
            Some(None) => Some(None),
            None => None,
        };

        let updated = self
            .providers
            .update_by_slug(
                slug,
                ProviderChanges {
                    display_name: update.display_name,
                    is_active: update.is_active,
                    capabilities: update.capabilities,
                    shared_credential_ciphertext,
                    allow_shared_for_operators: update.allow_shared_for_operators,
                    api_base_url: update.api_base_url,
                },
            )
            .await?;

        self.bus
            .publish(ConfigChange::Provider {
                slug: slug.to_string(),
            })
            .await;
        info!(
            is_active = updated.is_active,
            allow_shared_for_operators = updated.allow_shared_for_operators,
            "Updated provider"
        );
        Ok(updated)
    }

    /// Switches a provider off for everyone. Its models and override settings
    /// are kept.
    pub async fn deactivate_provider(&self, slug: &str) -> EngineResult<provider::Model> {
        self.update_provider(
            slug,
            ProviderUpdate {
                is_active: Some(false),
                ..ProviderUpdate::default()
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_provider(&self, slug: &str) -> EngineResult<()> {
        self.providers.delete_by_slug(slug).await?;
        self.bus
            .publish(ConfigChange::Provider {
                slug: slug.to_string(),
            })
            .await;
        info!("Deleted provider");
        Ok(())
    }

    pub async fn list_overrides(
        &self,
        operator_id: Uuid,
    ) -> EngineResult<Vec<admin_override_setting::Model>> {
        self.store.list_override_settings(operator_id).await
    }

    /// Stores the operator's own setting for a provider. An active setting
    /// with a credential takes precedence over shared access.
    #[instrument(skip(self, personal_credential))]
    pub async fn set_override(
        &self,
        operator_id: Uuid,
        provider_slug: &str,
        is_active: bool,
        personal_credential: Option<Credential>,
    ) -> EngineResult<admin_override_setting::Model> {
        if self.store.get_provider(provider_slug).await?.is_none() {
            return Err(EngineError::ProviderNotFound {
                slug: provider_slug.to_string(),
            });
        }

        let sealed = personal_credential
            .as_ref()
            .map(|credential| {
                seal_credential(
                    &self.key,
                    CredentialScope::Personal {
                        operator_id,
                        provider_slug,
                    },
                    credential,
                )
            })
            .transpose()?;

        let setting = self
            .store
            .upsert_override_setting(operator_id, provider_slug, is_active, sealed)
            .await?;

        self.bus
            .publish(ConfigChange::OverrideSetting { operator_id })
            .await;
        info!(is_active, "Stored override setting");
        Ok(setting)
    }

    /// Removes the operator's setting, opting them back into shared access.
    #[instrument(skip(self))]
    pub async fn remove_override(&self, operator_id: Uuid, provider_slug: &str) -> EngineResult<()> {
        self.store
            .delete_override_setting(operator_id, provider_slug)
            .await?;
        self.bus
            .publish(ConfigChange::OverrideSetting { operator_id })
            .await;
        info!("Removed override setting");
        Ok(())
    }

    pub async fn activate_model(&self, model_id: i32) -> EngineResult<capability_model::Model> {
        self.activation.activate(model_id).await
    }

    pub async fn deactivate_model(&self, model_id: i32) -> EngineResult<capability_model::Model> {
        self.activation.deactivate(model_id).await
    }

    pub async fn activation_violations(&self) -> EngineResult<Vec<ScopeViolation>> {
        self.activation.violations().await
    }

    /// Drops every cached entry. Returns `false` when the backend refused.
    pub async fn flush_cache(&self) -> bool {
        self.cache.flush().await
    }

    fn seal_shared(&self, slug: &str, credential: &Credential) -> EngineResult<Vec<u8>> {
        Ok(seal_credential(
            &self.key,
            CredentialScope::Shared {
                provider_slug: slug,
            },
            credential,
        )?)
    }
}
