//! # Activation Invariant Enforcer
//!
//! At most one capability model may be active per (provider, capability)
//! scope. The partial unique index `idx_capability_models_single_active` is
//! the source of truth; activation deactivates the rest of the scope in the
//! same transaction so callers normally never see the index reject a write.
//! Environments that predate the index are normalized by the migration that
//! creates it.

use metrics::counter;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::cache::{ConfigChange, InvalidationBus};
use crate::error::{EngineError, EngineResult, is_unique_violation};
use crate::models::capability::Capability;
use crate::models::capability_model;
use crate::store::ConfigStore;

/// A scope holding more than one active model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeViolation {
    pub provider_slug: String,
    pub capability: Capability,
    pub active_model_ids: Vec<i32>,
}

pub struct ActivationEnforcer {
    store: Arc<dyn ConfigStore>,
    bus: InvalidationBus,
}

impl ActivationEnforcer {
    pub fn new(store: Arc<dyn ConfigStore>, bus: InvalidationBus) -> Self {
        Self { store, bus }
    }

    /// Makes `model_id` the only active model of its scope.
    ///
    /// A unique-index rejection from a racing activation is retried once; a
    /// second rejection is reported as [`EngineError::ActivationConflict`].
    #[instrument(skip(self))]
    pub async fn activate(&self, model_id: i32) -> EngineResult<capability_model::Model> {
        let activated = match self.store.set_active(model_id, true).await {
            Err(EngineError::Database(err)) if is_unique_violation(&err) => {
                counter!("model_activation_conflicts_total").increment(1);
                warn!(model_id, "Activation raced with another activation; retrying once");
                match self.store.set_active(model_id, true).await {
                    Err(EngineError::Database(err)) if is_unique_violation(&err) => {
                        counter!("model_activation_conflicts_total").increment(1);
                        return Err(self.conflict(model_id).await);
                    }
                    other => other?,
                }
            }
            other => other?,
        };

        self.bus.publish(ConfigChange::Models).await;
        info!(
            model_id,
            provider_slug = %activated.provider_slug,
            capability = %activated.capability,
            model_identifier = %activated.model_identifier,
            "Activated capability model"
        );
        Ok(activated)
    }

    #[instrument(skip(self))]
    pub async fn deactivate(&self, model_id: i32) -> EngineResult<capability_model::Model> {
        let deactivated = self.store.set_active(model_id, false).await?;
        self.bus.publish(ConfigChange::Models).await;
        info!(
            model_id,
            provider_slug = %deactivated.provider_slug,
            capability = %deactivated.capability,
            "Deactivated capability model"
        );
        Ok(deactivated)
    }

    /// Scopes currently holding more than one active model. Always empty
    /// while the unique index is in place.
    pub async fn violations(&self) -> EngineResult<Vec<ScopeViolation>> {
        let mut scopes: BTreeMap<(String, Capability), Vec<i32>> = BTreeMap::new();
        for model in self.store.list_models().await? {
            if model.is_active {
                scopes
                    .entry((model.provider_slug, model.capability))
                    .or_default()
                    .push(model.id);
            }
        }

        Ok(scopes
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|((provider_slug, capability), active_model_ids)| ScopeViolation {
                provider_slug,
                capability,
                active_model_ids,
            })
            .collect())
    }

    async fn conflict(&self, model_id: i32) -> EngineError {
        match self.store.get_model(model_id).await {
            Ok(Some(model)) => EngineError::ActivationConflict {
                provider_slug: model.provider_slug,
                capability: model.capability,
            },
            Ok(None) => EngineError::ModelNotFound { id: model_id },
            Err(err) => err,
        }
    }
}
