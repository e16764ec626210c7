//! Cache-first access resolution and credential hand-out.

use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::{AccessState, Operator, resolve};
use crate::cache::CapabilityCache;
use crate::crypto::{Credential, CredentialScope, CryptoKey, open_credential};
use crate::error::EngineResult;
use crate::models::capability::Capability;
use crate::models::{admin_override_setting, capability_model, provider};

/// What an access check is about. Without a capability or model the check
/// covers the provider as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequest {
    pub provider_slug: String,
    pub capability: Option<Capability>,
    /// Specific model identifier; defaults to the scope's active model.
    pub model_identifier: Option<String>,
}

impl AccessRequest {
    pub fn provider(slug: impl Into<String>) -> Self {
        Self {
            provider_slug: slug.into(),
            ..Self::default()
        }
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn model(mut self, identifier: impl Into<String>) -> Self {
        self.model_identifier = Some(identifier.into());
        self
    }
}

/// Resolved state plus the credential the invocation layer should use.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub state: AccessState,
    pub credential: Option<Credential>,
    /// Model the grant applies to, when one was requested or is active.
    pub model_identifier: Option<String>,
}

/// One provider as seen by one operator for one capability.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProviderAccess {
    pub slug: String,
    pub display_name: String,
    pub state: AccessState,
    pub active_model: Option<String>,
}

/// Inputs gathered for one decision.
struct Resolution {
    state: AccessState,
    provider: Option<provider::Model>,
    model: Option<capability_model::Model>,
    override_setting: Option<admin_override_setting::Model>,
}

pub struct AccessResolver {
    cache: Arc<CapabilityCache>,
    key: CryptoKey,
}

impl AccessResolver {
    pub fn new(cache: Arc<CapabilityCache>, key: CryptoKey) -> Self {
        Self { cache, key }
    }

    /// Resolves the access state for `request`. Unknown providers and models
    /// resolve to `NoAccess`; only store failures are errors.
    #[instrument(skip(self), fields(operator_id = %operator.id, provider_slug = %request.provider_slug))]
    pub async fn resolve_by_slug(
        &self,
        operator: &Operator,
        request: &AccessRequest,
    ) -> EngineResult<AccessState> {
        Ok(self.gather(operator, request).await?.state)
    }

    /// Resolves `request` and opens the credential matching the state.
    #[instrument(skip(self), fields(operator_id = %operator.id, provider_slug = %request.provider_slug))]
    pub async fn credential_for(
        &self,
        operator: &Operator,
        request: &AccessRequest,
    ) -> EngineResult<AccessGrant> {
        let resolution = self.gather(operator, request).await?;

        let credential = match (resolution.state, &resolution.provider) {
            (AccessState::AvailableShared, Some(provider)) => provider
                .shared_credential_ciphertext
                .as_deref()
                .map(|sealed| {
                    open_credential(
                        &self.key,
                        CredentialScope::Shared {
                            provider_slug: &provider.slug,
                        },
                        sealed,
                    )
                })
                .transpose()?,
            (AccessState::AvailablePersonal, Some(provider)) => resolution
                .override_setting
                .as_ref()
                .and_then(|setting| setting.personal_credential_ciphertext.as_deref())
                .map(|sealed| {
                    open_credential(
                        &self.key,
                        CredentialScope::Personal {
                            operator_id: operator.id,
                            provider_slug: &provider.slug,
                        },
                        sealed,
                    )
                })
                .transpose()?,
            _ => None,
        };

        Ok(AccessGrant {
            state: resolution.state,
            credential,
            model_identifier: resolution.model.map(|model| model.model_identifier),
        })
    }

    /// Active providers supporting `capability`, each with the operator's
    /// access state and the scope's active model.
    #[instrument(skip(self), fields(operator_id = %operator.id))]
    pub async fn available_providers(
        &self,
        operator: &Operator,
        capability: Capability,
    ) -> EngineResult<Vec<ProviderAccess>> {
        let providers = self.cache.active_providers().await?;
        let models = self.cache.models().await?;
        // A super-operator only needs its settings for providers without a
        // shared credential.
        let needs_overrides = !operator.is_super
            || providers
                .iter()
                .any(|provider| provider.supports(capability) && !provider.has_shared_credential());
        let overrides = if needs_overrides {
            self.cache.operator_overrides(operator.id).await?
        } else {
            Vec::new()
        };

        let mut listing = Vec::new();
        for provider in providers.iter().filter(|p| p.supports(capability)) {
            let active_model = models.iter().find(|model| {
                model.provider_slug == provider.slug
                    && model.capability == capability
                    && model.is_active
            });
            let setting = overrides
                .iter()
                .find(|setting| setting.provider_slug == provider.slug);
            let state = resolve(operator, provider, active_model, setting);
            counter!("access_resolutions_total", "state" => state.as_str()).increment(1);

            listing.push(ProviderAccess {
                slug: provider.slug.clone(),
                display_name: provider.display_name.clone(),
                state,
                active_model: active_model.map(|model| model.model_identifier.clone()),
            });
        }
        Ok(listing)
    }

    async fn gather(&self, operator: &Operator, request: &AccessRequest) -> EngineResult<Resolution> {
        let Some(provider) = self.cache.provider(&request.provider_slug).await? else {
            debug!("Unknown provider resolves to no access");
            return Ok(self.finish(Resolution {
                state: AccessState::NoAccess,
                provider: None,
                model: None,
                override_setting: None,
            }));
        };

        let model = match (&request.model_identifier, request.capability) {
            (None, None) => None,
            (identifier, capability) => {
                let models = self.cache.models().await?;
                let found = models.into_iter().find(|model| {
                    model.provider_slug == provider.slug
                        && capability.is_none_or(|capability| model.capability == capability)
                        && match identifier {
                            Some(identifier) => model.model_identifier == *identifier,
                            None => model.is_active,
                        }
                });
                if identifier.is_some() && found.is_none() {
                    debug!(model_identifier = ?identifier, "Unknown model resolves to no access");
                    return Ok(self.finish(Resolution {
                        state: AccessState::NoAccess,
                        provider: Some(provider),
                        model: None,
                        override_setting: None,
                    }));
                }
                found
            }
        };

        // Super-operators consult their setting only when the provider has no
        // shared credential to fall back on.
        let override_setting = if operator.is_super && provider.has_shared_credential() {
            None
        } else {
            self.cache
                .operator_overrides(operator.id)
                .await?
                .into_iter()
                .find(|setting| setting.provider_slug == provider.slug)
        };

        let mut state = resolve(operator, &provider, model.as_ref(), override_setting.as_ref());
        let capability = request
            .capability
            .or_else(|| model.as_ref().map(|model| model.capability));
        if state.is_available() && capability.is_some_and(|capability| !provider.supports(capability))
        {
            state = AccessState::NoAccess;
        }

        Ok(self.finish(Resolution {
            state,
            provider: Some(provider),
            model,
            override_setting,
        }))
    }

    fn finish(&self, resolution: Resolution) -> Resolution {
        counter!("access_resolutions_total", "state" => resolution.state.as_str()).increment(1);
        debug!(state = %resolution.state, "Resolved access state");
        resolution
    }
}
