//! Configuration store seam.
//!
//! [`ConfigStore`] is the durable record of providers, capability models and
//! override settings as seen by the resolver, the activation enforcer and the
//! sync job. [`DbConfigStore`] backs it with the SeaORM repositories.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::capability::Capability;
use crate::models::{admin_override_setting, capability_model, provider};
use crate::repositories::{
    CapabilityModelRepository, ModelUpsert, OverrideSettingRepository, ProviderRepository,
    UpsertOutcome,
};

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_provider(&self, slug: &str) -> EngineResult<Option<provider::Model>>;

    async fn list_active_providers(&self) -> EngineResult<Vec<provider::Model>>;

    async fn get_model(&self, id: i32) -> EngineResult<Option<capability_model::Model>>;

    /// Every capability model known to the store.
    async fn list_models(&self) -> EngineResult<Vec<capability_model::Model>>;

    async fn list_models_for(
        &self,
        provider_slug: &str,
        capability: Option<Capability>,
    ) -> EngineResult<Vec<capability_model::Model>>;

    async fn list_override_settings(
        &self,
        operator_id: Uuid,
    ) -> EngineResult<Vec<admin_override_setting::Model>>;


    /// Reconciles one provider's models in a single transaction.
    async fn upsert_models(
        &self,
        provider_slug: &str,
        models: Vec<ModelUpsert>,
    ) -> EngineResult<Vec<UpsertOutcome>>;

    /// Sets a model's active flag. Activation deactivates every other model
    /// in the same (provider, capability) scope within the same transaction.
    async fn set_active(&self, model_id: i32, active: bool)
    -> EngineResult<capability_model::Model>;

    async fn upsert_override_setting(
        &self,
        operator_id: Uuid,
        provider_slug: &str,
        is_active: bool,
        personal_credential_ciphertext: Option<Vec<u8>>,
    ) -> EngineResult<admin_override_setting::Model>;

    /// Fails with `OverrideNotFound` when the operator has no setting.
    async fn delete_override_setting(&self, operator_id: Uuid, provider_slug: &str)
    -> EngineResult<()>;
}

/// SeaORM-backed configuration store.
#[derive(Debug, Clone)]
pub struct DbConfigStore {
    db: Arc<DatabaseConnection>,
    providers: ProviderRepository,
    models: CapabilityModelRepository,
    overrides: OverrideSettingRepository,
}

impl DbConfigStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            providers: ProviderRepository::new(db.clone()),
            models: CapabilityModelRepository::new(db.clone()),
            overrides: OverrideSettingRepository::new(db.clone()),
            db,
        }
    }
}

#[async_trait]
impl ConfigStore for DbConfigStore {
    async fn get_provider(&self, slug: &str) -> EngineResult<Option<provider::Model>> {
        self.providers.find_by_slug(slug).await
    }

    async fn list_active_providers(&self) -> EngineResult<Vec<provider::Model>> {
        self.providers.find_active().await
    }

    async fn get_model(&self, id: i32) -> EngineResult<Option<capability_model::Model>> {
        self.models.find_by_id(id).await
    }

    async fn list_models(&self) -> EngineResult<Vec<capability_model::Model>> {
        self.models.find_all().await
    }

    async fn list_models_for(
        &self,
        provider_slug: &str,
        capability: Option<Capability>,
    ) -> EngineResult<Vec<capability_model::Model>> {
        self.models.list_for(provider_slug, capability).await
    }

    async fn list_override_settings(
        &self,
        operator_id: Uuid,
    ) -> EngineResult<Vec<admin_override_setting::Model>> {
        self.overrides.list_for_operator(operator_id).await
    }

    async fn upsert_models(
        &self,
        provider_slug: &str,
        models: Vec<ModelUpsert>,
    ) -> EngineResult<Vec<UpsertOutcome>> {
        let txn = self.db.begin().await?;
        let mut outcomes = Vec::with_capacity(models.len());
        for upsert in models {
            debug_assert_eq!(upsert.provider_slug, provider_slug);
            outcomes.push(CapabilityModelRepository::upsert_in(&txn, upsert).await?);
        }
        txn.commit().await?;
        Ok(outcomes)
    }

    async fn set_active(
        &self,
        model_id: i32,
        active: bool,
    ) -> EngineResult<capability_model::Model> {
        let txn = self.db.begin().await?;

        let target = capability_model::Entity::find_by_id(model_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(EngineError::ModelNotFound { id: model_id })?;
        let now: DateTimeWithTimeZone = Utc::now().into();

        if active {
            // Lock the scope's active rows so racing activations serialize here
            // instead of at the unique index where possible.
            capability_model::Entity::find()
                .filter(capability_model::Column::ProviderSlug.eq(target.provider_slug.as_str()))
                .filter(capability_model::Column::Capability.eq(target.capability))
                .filter(capability_model::Column::IsActive.eq(true))
                .lock(LockType::Update)
                .all(&txn)
                .await?;

            capability_model::Entity::update_many()
                .col_expr(capability_model::Column::IsActive, Expr::value(false))
                .col_expr(capability_model::Column::UpdatedAt, Expr::value(now))
                .filter(capability_model::Column::ProviderSlug.eq(target.provider_slug.as_str()))
                .filter(capability_model::Column::Capability.eq(target.capability))
                .filter(capability_model::Column::IsActive.eq(true))
                .filter(capability_model::Column::Id.ne(model_id))
                .exec(&txn)
                .await?;
        }

        capability_model::Entity::update_many()
            .col_expr(capability_model::Column::IsActive, Expr::value(active))
            .col_expr(capability_model::Column::UpdatedAt, Expr::value(now))
            .filter(capability_model::Column::Id.eq(model_id))
            .exec(&txn)
            .await?;

        let updated = capability_model::Entity::find_by_id(model_id)
            .one(&txn)
            .await?
            .ok_or(EngineError::ModelNotFound { id: model_id })?;

        txn.commit().await?;
        Ok(updated)
    }

    async fn upsert_override_setting(
        &self,
        operator_id: Uuid,
        provider_slug: &str,
        is_active: bool,
        personal_credential_ciphertext: Option<Vec<u8>>,
    ) -> EngineResult<admin_override_setting::Model> {
        self.overrides
            .upsert(
                operator_id,
                provider_slug,
                is_active,
                personal_credential_ciphertext,
            )
            .await
    }

    async fn delete_override_setting(
        &self,
        operator_id: Uuid,
        provider_slug: &str,
    ) -> EngineResult<()> {
        self.overrides.delete(operator_id, provider_slug).await
    }
}
