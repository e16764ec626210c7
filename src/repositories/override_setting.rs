//! Admin override setting repository
//!
//! One row per (operator, provider). Removing the row means the operator opts
//! back into shared access.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult, is_unique_violation};
use crate::models::admin_override_setting::{self, Entity as AdminOverrideSetting};

#[derive(Debug, Clone)]
pub struct OverrideSettingRepository {
    pub db: Arc<DatabaseConnection>,
}

impl OverrideSettingRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find(
        &self,
        operator_id: Uuid,
        provider_slug: &str,
    ) -> EngineResult<Option<admin_override_setting::Model>> {
        Ok(AdminOverrideSetting::find()
            .filter(admin_override_setting::Column::OperatorId.eq(operator_id))
            .filter(admin_override_setting::Column::ProviderSlug.eq(provider_slug))
            .one(&*self.db)
            .await?)
    }

    pub async fn list_for_operator(
        &self,
        operator_id: Uuid,
    ) -> EngineResult<Vec<admin_override_setting::Model>> {
        Ok(AdminOverrideSetting::find()
            .filter(admin_override_setting::Column::OperatorId.eq(operator_id))
            .order_by_asc(admin_override_setting::Column::ProviderSlug)
            .all(&*self.db)
            .await?)
    }

    /// Inserts or replaces the operator's setting for a provider.
    pub async fn upsert(
        &self,
        operator_id: Uuid,
        provider_slug: &str,
        is_active: bool,
        personal_credential_ciphertext: Option<Vec<u8>>,
    ) -> EngineResult<admin_override_setting::Model> {
        if let Some(existing) = self.find(operator_id, provider_slug).await? {
            return self
                .update_existing(existing, is_active, personal_credential_ciphertext)
                .await;
        }

        let now = Utc::now();
        let inserted = admin_override_setting::ActiveModel {
            operator_id: Set(operator_id),
            provider_slug: Set(provider_slug.to_string()),
            is_active: Set(is_active),
            personal_credential_ciphertext: Set(personal_credential_ciphertext.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await;

        match inserted {
            Ok(model) => Ok(model),
            // A concurrent upsert created the row first; apply ours on top.
            Err(err) if is_unique_violation(&err) => {
                let existing = self.find(operator_id, provider_slug).await?.ok_or(err)?;
                self.update_existing(existing, is_active, personal_credential_ciphertext)
                    .await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_existing(
        &self,
        existing: admin_override_setting::Model,
        is_active: bool,
        personal_credential_ciphertext: Option<Vec<u8>>,
    ) -> EngineResult<admin_override_setting::Model> {
        let mut active_model: admin_override_setting::ActiveModel = existing.into();
        active_model.is_active = Set(is_active);
        active_model.personal_credential_ciphertext = Set(personal_credential_ciphertext);
        active_model.updated_at = Set(Utc::now().into());
        Ok(active_model.update(&*self.db).await?)
    }

    pub async fn delete(&self, operator_id: Uuid, provider_slug: &str) -> EngineResult<()> {
        let result = AdminOverrideSetting::delete_many()
            .filter(admin_override_setting::Column::OperatorId.eq(operator_id))
            .filter(admin_override_setting::Column::ProviderSlug.eq(provider_slug))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(EngineError::OverrideNotFound {
                operator_id,
                provider_slug: provider_slug.to_string(),
            });
        }
        Ok(())
    }
}
