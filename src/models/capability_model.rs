//! Capability model entity
//!
//! One concrete model a provider offers for one capability. At most one row per
//! (provider, capability) may be active; the partial unique index
//! `idx_capability_models_single_active` enforces it.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

use super::capability::Capability;
use super::provider::Entity as Provider;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "capability_models")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Slug of the provider offering the model
    pub provider_slug: String,

    pub capability: Capability,

    /// Vendor-side model identifier, e.g. `gpt-4o`
    pub model_identifier: String,

    /// Optional label reported by discovery
    pub display_name: Option<String>,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Provider",
        from = "Column::ProviderSlug",
        to = "super::provider::Column::Slug"
    )]
    Provider,
}

impl Related<Provider> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// API view of a capability model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CapabilityModelView {
    pub id: i32,
    pub provider_slug: String,
    pub capability: Capability,
    pub model_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub is_active: bool,
}

impl From<Model> for CapabilityModelView {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            provider_slug: model.provider_slug,
            capability: model.capability,
            model_identifier: model.model_identifier,
            display_name: model.display_name,
            is_active: model.is_active,
        }
    }
}
