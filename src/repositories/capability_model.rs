//! Capability model repository
//!
//! Reads and idempotent upserts for the capability_models table. Activation
//! is not handled here: it goes through the activation enforcer so the
//! single-active rule is kept inside one transaction.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;

use crate::error::EngineResult;
use crate::models::capability::Capability;
use crate::models::capability_model::{self, Entity as CapabilityModel};

/// Result of reconciling one model identifier against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(capability_model::Model),
    Updated(capability_model::Model),
    Unchanged(capability_model::Model),
}

impl UpsertOutcome {
    pub fn model(&self) -> &capability_model::Model {
        match self {
            UpsertOutcome::Created(model)
            | UpsertOutcome::Updated(model)
            | UpsertOutcome::Unchanged(model) => model,
        }
    }
}

/// Identity and descriptive fields of a model to reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUpsert {
    pub provider_slug: String,
    pub capability: Capability,
    pub model_identifier: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CapabilityModelRepository {
    pub db: Arc<DatabaseConnection>,
}

impl CapabilityModelRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> EngineResult<Option<capability_model::Model>> {
        Ok(CapabilityModel::find_by_id(id).one(&*self.db).await?)
    }

    /// All models ordered by provider, capability and identifier.
    pub async fn find_all(&self) -> EngineResult<Vec<capability_model::Model>> {
        Ok(CapabilityModel::find()
            .order_by_asc(capability_model::Column::ProviderSlug)
            .order_by_asc(capability_model::Column::Capability)
            .order_by_asc(capability_model::Column::ModelIdentifier)
            .all(&*self.db)
            .await?)
    }

    pub async fn list_for(
        &self,
        provider_slug: &str,
        capability: Option<Capability>,
    ) -> EngineResult<Vec<capability_model::Model>> {
        let mut query = CapabilityModel::find()
            .filter(capability_model::Column::ProviderSlug.eq(provider_slug));
        if let Some(capability) = capability {
            query = query.filter(capability_model::Column::Capability.eq(capability));
        }
        Ok(query
            .order_by_asc(capability_model::Column::Capability)
            .order_by_asc(capability_model::Column::ModelIdentifier)
            .all(&*self.db)
            .await?)
    }

    /// Creates the model if its identity is unknown, refreshes its display
    /// name if that changed, and otherwise leaves the row alone. The active
    /// flag is never touched.
    pub async fn upsert_in<C: ConnectionTrait>(
        conn: &C,
        upsert: ModelUpsert,
    ) -> EngineResult<UpsertOutcome> {
        let existing = CapabilityModel::find()
            .filter(capability_model::Column::ProviderSlug.eq(upsert.provider_slug.as_str()))
            .filter(capability_model::Column::Capability.eq(upsert.capability))
            .filter(capability_model::Column::ModelIdentifier.eq(upsert.model_identifier.as_str()))
            .one(conn)
            .await?;

        let now = Utc::now();
        match existing {
            None => {
                let created = capability_model::ActiveModel {
                    provider_slug: Set(upsert.provider_slug),
                    capability: Set(upsert.capability),
                    model_identifier: Set(upsert.model_identifier),
                    display_name: Set(upsert.display_name),
                    is_active: Set(false),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                }
                .insert(conn)
                .await?;
                Ok(UpsertOutcome::Created(created))
            }
            Some(model)
                if upsert.display_name.is_some() && upsert.display_name != model.display_name =>
            {
                let mut active_model: capability_model::ActiveModel = model.into();
                active_model.display_name = Set(upsert.display_name);
                active_model.updated_at = Set(now.into());
                Ok(UpsertOutcome::Updated(active_model.update(conn).await?))
            }
            Some(model) => Ok(UpsertOutcome::Unchanged(model)),
        }
    }
}
